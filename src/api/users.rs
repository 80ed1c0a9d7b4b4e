use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::auth::{auth::AuthUser, password::hash_password};
use crate::error::{AppError, AppResult, created};
use crate::model::role::Role;
use crate::repo::academic_repo;
use crate::utils::username_filter;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize, ToSchema)]
pub struct RegisterUser {
    #[schema(example = "faculty.hossain")]
    pub username: String,
    pub password: String,
    pub role: Role,
    /// Faculty or student row the account acts as; must be empty for admins
    #[schema(example = 7)]
    pub profile_id: Option<u64>,
}

fn validate_registration(req: &RegisterUser) -> AppResult<()> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Username and password must not be empty"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    match (req.role, req.profile_id) {
        (Role::Admin, Some(_)) => Err(AppError::validation("Admin accounts have no profile")),
        (Role::Faculty | Role::Student, None) => {
            Err(AppError::validation("profile_id is required for faculty and student accounts"))
        }
        _ => Ok(()),
    }
}

/// true  => username AVAILABLE
/// false => username TAKEN
pub async fn is_username_available(username: &str, pool: &MySqlPool) -> AppResult<bool> {
    let username = username_filter::normalize(username);

    // certain negative from the cuckoo filter
    if !username_filter::might_exist(&username) {
        return Ok(true);
    }

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE LOWER(username) = ?")
        .bind(&username)
        .fetch_one(pool)
        .await?;

    Ok(count == 0)
}

/// Register an account inside the admin's university
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Account created", body = Object, example = json!({
            "success": true, "message": "User registered successfully", "data": {"id": 17}
        })),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Profile not found"),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(
    name = "register_user",
    skip_all,
    fields(university_id = auth.university_id, username = %payload.username)
)]
pub async fn register_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<RegisterUser>,
) -> AppResult<HttpResponse> {
    auth.require_admin()?;
    validate_registration(&payload)?;

    let university_id = auth.university_id;
    let username = payload.username.trim();

    let profile_found = match (payload.role, payload.profile_id) {
        (Role::Faculty, Some(id)) => {
            academic_repo::faculty_exists(pool.get_ref(), university_id, id).await?
        }
        (Role::Student, Some(id)) => academic_repo::get_student(pool.get_ref(), university_id, id)
            .await?
            .is_some(),
        _ => true,
    };
    if !profile_found {
        return Err(AppError::not_found("Profile not found in this university"));
    }

    if !is_username_available(username, pool.get_ref()).await? {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let hashed = hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO users (university_id, username, password, role_id, profile_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(university_id)
    .bind(username)
    .bind(hashed)
    .bind(payload.role.id())
    .bind(payload.profile_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::from(e).or_conflict("Username already taken"))?;

    username_filter::insert(username);
    info!(role = %payload.role, "User registered");

    Ok(created(
        "User registered successfully",
        json!({ "id": result.last_insert_id() }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(role: Role, profile_id: Option<u64>, password: &str) -> RegisterUser {
        RegisterUser {
            username: "someone".into(),
            password: password.into(),
            role,
            profile_id,
        }
    }

    #[test]
    fn profile_rules_follow_role() {
        assert!(validate_registration(&req(Role::Admin, None, "longenough")).is_ok());
        assert!(validate_registration(&req(Role::Admin, Some(1), "longenough")).is_err());
        assert!(validate_registration(&req(Role::Student, None, "longenough")).is_err());
        assert!(validate_registration(&req(Role::Faculty, Some(7), "longenough")).is_ok());
    }

    #[test]
    fn short_passwords_are_rejected() {
        let err = validate_registration(&req(Role::Student, Some(1), "short")).unwrap_err();
        assert!(err.to_string().contains("at least"));
    }
}
