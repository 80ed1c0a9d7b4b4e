use crate::error::AppError;
use crate::{model::role::Role, models::Claims};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
    /// Tenant every query of this request is scoped to
    pub university_id: u64,

    /// Faculty or student row this account is linked to
    pub profile_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let role = Role::from_id(claims.role)?;
        Some(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            university_id: claims.university_id,
            profile_id: claims.profile_id,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // only auth_middleware inserts the identity, after checking the token type
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Missing token".into())),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin only"))
        }
    }

    /// Faculty profile id of the caller.
    pub fn require_faculty(&self) -> Result<u64, AppError> {
        match (self.role, self.profile_id) {
            (Role::Faculty, Some(id)) => Ok(id),
            (Role::Faculty, None) => Err(AppError::forbidden("No faculty profile")),
            _ => Err(AppError::forbidden("Faculty only")),
        }
    }

    /// Student profile id of the caller.
    pub fn require_student(&self) -> Result<u64, AppError> {
        match (self.role, self.profile_id) {
            (Role::Student, Some(id)) => Ok(id),
            (Role::Student, None) => Err(AppError::forbidden("No student profile")),
            _ => Err(AppError::forbidden("Student only")),
        }
    }
}
