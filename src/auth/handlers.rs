use crate::{
    auth::{
        auth::AuthUser,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    error::{AppError, AppResult, Envelope, ok},
    models::{Claims, LoginReqDto, TokenType, UserSql},
};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, ToSchema)]
pub struct Me {
    pub user_id: u64,
    pub username: String,
    pub role: String,
    pub university_id: u64,
    pub profile_id: Option<u64>,
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn token_error(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Internal(format!("token generation failed: {}", e))
}

fn ensure_consumed(rows_affected: u64) -> AppResult<()> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Invalid refresh token".into()))
    }
}

/// Identity for the rotated pair, taken from the current user row rather than
/// the old token so role and profile changes apply.
fn refresh_subject(user: Option<UserSql>) -> AppResult<TokenSubject> {
    match user {
        Some(u) if u.is_active => Ok(TokenSubject::from(&u)),
        Some(u) => {
            info!(user_id = u.id, "Refresh refused: account disabled");
            Err(AppError::Unauthorized("Account disabled".into()))
        }
        None => Err(AppError::Unauthorized("Invalid refresh token".into())),
    }
}

/// Issues a fresh access/refresh pair and stores the refresh `jti`.
async fn issue_tokens(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> AppResult<TokenPair> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
            .map_err(token_error)?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(token_error)?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Login
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Tokens issued", body = TokenPair),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        return Err(AppError::validation("Username and password are required"));
    }

    let db_user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, university_id, username, password, role_id, profile_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Login refused: account disabled");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let tokens = issue_tokens(&TokenSubject::from(&db_user), pool.get_ref(), &config).await?;

    // non-fatal
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(university_id = db_user.university_id, "Login successful");

    Ok(ok("Login successful", tokens))
}

/// Current identity
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Authenticated identity", body = Me),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser) -> HttpResponse {
    ok(
        "Authenticated",
        Me {
            user_id: auth.user_id,
            username: auth.username,
            role: auth.role.to_string(),
            university_id: auth.university_id,
            profile_id: auth.profile_id,
        },
    )
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, invalid or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let unauthorized = || AppError::Unauthorized("Invalid refresh token".into());

    let token = bearer(&req).ok_or_else(unauthorized)?;
    let claims: Claims = verify_token(token, &config.jwt_secret).map_err(|_| unauthorized())?;

    if claims.token_type != TokenType::Refresh {
        return Err(unauthorized());
    }

    // single statement so two requests with the same token cannot both win
    let consumed = sqlx::query(
        "UPDATE refresh_tokens SET revoked = 1 WHERE jti = ? AND user_id = ? AND revoked = 0",
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    if let Err(e) = ensure_consumed(consumed) {
        info!(user_id = claims.user_id, "Revoked or unknown refresh token presented");
        return Err(e);
    }

    let user = sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, university_id, username, password, role_id, profile_id, is_active
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let subject = refresh_subject(user)?;
    let tokens = issue_tokens(&subject, pool.get_ref(), &config).await?;

    Ok(ok("Token refreshed", tokens))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Logged out (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> HttpResponse {
    let done = || HttpResponse::Ok().json(Envelope::message(true, "Logged out"));

    let Some(token) = bearer(&req) else {
        return done();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return done(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    done()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use actix_web::http::StatusCode;

    fn user_row(is_active: bool) -> UserSql {
        UserSql {
            id: 42,
            university_id: 3,
            username: "faculty.rahman".into(),
            password: "hash".into(),
            role_id: 2,
            profile_id: Some(7),
            is_active,
        }
    }

    #[test]
    fn only_one_rotation_of_a_token_succeeds() {
        assert!(ensure_consumed(1).is_ok());

        // a second request finds the row already revoked
        let err = ensure_consumed(0).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn refresh_uses_current_user_row() {
        let subject = refresh_subject(Some(user_row(true))).unwrap();
        assert_eq!(subject.user_id, 42);
        assert_eq!(subject.role, 2);
        assert_eq!(subject.university_id, 3);
        assert_eq!(subject.profile_id, Some(7));
    }

    #[test]
    fn disabled_or_deleted_accounts_cannot_refresh() {
        let err = refresh_subject(Some(user_row(false))).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = refresh_subject(None).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
