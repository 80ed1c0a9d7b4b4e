use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;
use tracing::info;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult, ok};
use crate::model::settings::{AttendanceSettings, UpdateSettings};
use crate::repo::settings_repo;
use crate::utils::settings_cache::SettingsCache;

/// Read attendance settings (created with defaults on first read)
#[utoipa::path(
    get,
    path = "/api/admin/attendance/settings",
    responses(
        (status = 200, description = "Current settings", body = AttendanceSettings),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn get_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    let settings = cache.resolve(pool.get_ref(), auth.university_id).await?;
    Ok(ok("Attendance settings fetched", settings))
}

/// Update attendance settings
#[utoipa::path(
    put,
    path = "/api/admin/attendance/settings",
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Updated settings", body = AttendanceSettings),
        (status = 400, description = "Invalid thresholds"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    cache: web::Data<SettingsCache>,
    payload: web::Json<UpdateSettings>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;

    // always start from the stored row, not a possibly stale cache entry
    let current = settings_repo::get_or_create(pool.get_ref(), auth.university_id).await?;
    let next = payload.apply_to(&current);
    next.validate().map_err(AppError::Validation)?;

    settings_repo::save(pool.get_ref(), &next).await?;
    cache.put(next.clone()).await;

    info!(
        university_id = auth.university_id,
        user_id = auth.user_id,
        min = next.min_attendance_percentage,
        warn = next.warn_at_percentage,
        "Attendance settings updated"
    );

    Ok(ok("Attendance settings updated", next))
}
