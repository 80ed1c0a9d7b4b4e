use crate::{
    api::{academic, admin_attendance, faculty_attendance, settings, student_attendance, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::Envelope,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{
    Error, HttpResponse,
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::{StatusCode, header, header::HeaderMap},
    middleware::{Next, from_fn},
    web,
};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-route limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / requests_per_min as u64).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

fn too_many_requests(limited: &HeaderMap) -> HttpResponse {
    let mut resp = HttpResponse::TooManyRequests();
    if let Some(retry_after) = limited.get(header::RETRY_AFTER) {
        resp.insert_header((header::RETRY_AFTER, retry_after.clone()));
    }
    resp.json(Envelope::message(false, "Too many requests"))
}

/// Rewrites the limiter's plain-text 429 into the JSON envelope.
pub async fn rate_limit_envelope(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let http_req = req.request().clone();

    match next.call(req).await {
        Ok(res) if res.status() == StatusCode::TOO_MANY_REQUESTS => {
            let body = too_many_requests(res.headers());
            Ok(res.into_response(body))
        }
        Ok(res) => Ok(res.map_into_boxed_body()),
        Err(e) if e.as_response_error().status_code() == StatusCode::TOO_MANY_REQUESTS => {
            let body = too_many_requests(e.error_response().headers());
            Ok(ServiceResponse::new(http_req, body))
        }
        Err(e) => Err(e),
    }
}

/// Rate limiters shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let limiter = |rate: u32| {
            build_limiter(rate)
                .map(Arc::new)
                .ok_or_else(|| anyhow::anyhow!("invalid rate limit: {} per minute", rate))
        };

        Ok(Self {
            login: limiter(config.rate_login_per_min)?,
            refresh: limiter(config.rate_refresh_per_min)?,
            protected: limiter(config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .wrap(from_fn(rate_limit_envelope))
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .wrap(from_fn(rate_limit_envelope))
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .wrap(from_fn(rate_limit_envelope))
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .wrap(from_fn(rate_limit_envelope))
            .route("/me", web::get().to(handlers::me))
            .service(
                web::scope("/admin")
                    .route("/users", web::post().to(users::register_user))
                    .service(
                        web::resource("/classes")
                            .route(web::post().to(academic::create_class))
                            .route(web::get().to(academic::list_classes)),
                    )
                    .service(
                        web::resource("/subjects")
                            .route(web::post().to(academic::create_subject))
                            .route(web::get().to(academic::list_subjects)),
                    )
                    .service(
                        web::resource("/students")
                            .route(web::post().to(academic::create_student))
                            .route(web::get().to(academic::list_students)),
                    )
                    .service(
                        web::resource("/faculty")
                            .route(web::post().to(academic::create_faculty))
                            .route(web::get().to(academic::list_faculty)),
                    )
                    .service(
                        web::resource("/holidays")
                            .route(web::post().to(academic::create_holiday))
                            .route(web::get().to(academic::list_holidays)),
                    )
                    .service(
                        web::resource("/classrooms")
                            .route(web::post().to(academic::create_classroom))
                            .route(web::get().to(academic::list_classrooms)),
                    )
                    .service(
                        web::resource("/timetable")
                            .route(web::post().to(academic::create_timetable_slot))
                            .route(web::get().to(academic::list_timetable)),
                    )
                    .service(
                        web::scope("/attendance")
                            // /admin/attendance/settings
                            .service(
                                web::resource("/settings")
                                    .route(web::get().to(settings::get_settings))
                                    .route(web::put().to(settings::update_settings)),
                            )
                            .route("/report", web::get().to(admin_attendance::report))
                            .route("/low", web::get().to(admin_attendance::low_attendance)),
                    ),
            )
            .service(
                web::scope("/faculty/attendance")
                    .route("", web::post().to(faculty_attendance::mark_attendance))
                    .route("/records", web::get().to(faculty_attendance::list_records))
                    // /faculty/attendance/class/{class_id}
                    .route(
                        "/class/{class_id}",
                        web::get().to(faculty_attendance::class_stats),
                    ),
            )
            .service(
                web::scope("/student/attendance")
                    .route("", web::get().to(student_attendance::my_attendance))
                    .route("/history", web::get().to(student_attendance::my_history))
                    .route("/self-mark", web::post().to(student_attendance::self_mark)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token + rotated refresh_token

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::{App, test};

    async fn pong() -> HttpResponse {
        HttpResponse::Ok().body("pong")
    }

    #[actix_web::test]
    async fn rate_limited_requests_get_json_envelope() {
        let limiter = build_limiter(1).unwrap();
        let app = test::init_service(
            App::new().service(
                web::resource("/ping")
                    .wrap(limiter)
                    .wrap(from_fn(rate_limit_envelope))
                    .route(web::get().to(pong)),
            ),
        )
        .await;

        let peer = "10.0.0.9:4000".parse().unwrap();
        let first = test::TestRequest::get().uri("/ping").peer_addr(peer).to_request();
        assert_eq!(test::call_service(&app, first).await.status(), StatusCode::OK);

        let second = test::TestRequest::get().uri("/ping").peer_addr(peer).to_request();
        let resp = test::call_service(&app, second).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Too many requests");
    }

    #[::core::prelude::v1::test]
    fn limiter_builds_for_edge_rates() {
        for rate in [0, 1, 60, 1000, 120_000] {
            assert!(build_limiter(rate).is_some(), "rate {}", rate);
        }
    }
}
