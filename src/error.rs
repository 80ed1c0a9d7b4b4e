use actix_web::{HttpRequest, HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

/// `{ success, message, data }` wrapper used by every JSON response.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    pub fn message(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            data: None,
        }
    }
}

pub fn ok<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(Envelope::ok(message, data))
}

pub fn created<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Created().json(Envelope::ok(message, data))
}

/// Error handler for the Json, Query and Path extractors so malformed input
/// gets the same 400 envelope as other validation failures.
pub fn bad_request<E: std::fmt::Display>(err: E, _: &HttpRequest) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// MySQL reports unique-key violations as SQLSTATE 23000.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23000")
            }
            _ => false,
        }
    }

    /// Maps a duplicate-key failure to 409, leaves anything else as is.
    pub fn or_conflict(self, msg: &str) -> Self {
        if self.is_duplicate_key() {
            AppError::Conflict(msg.to_string())
        } else {
            self
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Internal Server Error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(Envelope::message(false, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(resp: HttpResponse) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn validation_renders_400_envelope() {
        let resp = AppError::validation("slot_number must be between 1 and 12").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "slot_number must be between 1 and 12");
        assert!(body["data"].is_null());
    }

    #[actix_web::test]
    async fn internal_errors_do_not_leak_details() {
        let resp = AppError::Database(sqlx::Error::RowNotFound).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(resp).await;
        assert_eq!(body["message"], "Internal Server Error");
    }

    #[test]
    fn non_duplicate_errors_stay_as_they_are() {
        let err = AppError::Database(sqlx::Error::RowNotFound).or_conflict("taken");
        assert!(matches!(err, AppError::Database(_)));

        let err = AppError::not_found("Class not found").or_conflict("taken");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn unparsable_path_segment_is_enveloped_400() {
        use actix_web::{App, test, web};

        async fn by_id(id: web::Path<u64>) -> HttpResponse {
            ok("Found", id.into_inner())
        }

        let app = test::init_service(
            App::new()
                .app_data(web::PathConfig::default().error_handler(bad_request))
                .route("/class/{class_id}", web::get().to(by_id)),
        )
        .await;

        let req = test::TestRequest::get().uri("/class/abc").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        let req = test::TestRequest::get().uri("/class/4").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"], 4);
    }

    #[actix_web::test]
    async fn ok_wraps_data() {
        let body = body_json(ok("Fetched", vec![1, 2, 3])).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], serde_json::json!([1, 2, 3]));
    }
}
