use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType, UserSql};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

/// Who a token is issued for.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: u64,
    pub username: String,
    pub role: u8,
    pub university_id: u64,
    pub profile_id: Option<u64>,
}

impl From<&UserSql> for TokenSubject {
    fn from(u: &UserSql) -> Self {
        Self {
            user_id: u.id,
            username: u.username.clone(),
            role: u.role_id,
            university_id: u.university_id,
            profile_id: u.profile_id,
        }
    }
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

fn claims_for(subject: &TokenSubject, ttl: usize, token_type: TokenType) -> Claims {
    Claims {
        user_id: subject.user_id,
        sub: subject.username.clone(),
        role: subject.role,
        university_id: subject.university_id,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        profile_id: subject.profile_id,
    }
}

pub fn generate_access_token(subject: &TokenSubject, secret: &str, ttl: usize) -> Result<String, Error> {
    let claims = claims_for(subject, ttl, TokenType::Access);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_refresh_token(
    subject: &TokenSubject,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = claims_for(subject, ttl, TokenType::Refresh);

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: 42,
            username: "student.ayesha".into(),
            role: 3,
            university_id: 9,
            profile_id: Some(301),
        }
    }

    #[test]
    fn access_token_verifies_with_same_secret() {
        let token = generate_access_token(&subject(), "s3cret", 60).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.university_id, 9);
        assert_eq!(claims.profile_id, Some(301));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(&subject(), "s3cret", 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn refresh_tokens_get_unique_jti() {
        let (_, a) = generate_refresh_token(&subject(), "s3cret", 60).unwrap();
        let (_, b) = generate_refresh_token(&subject(), "s3cret", 60).unwrap();
        assert_eq!(a.token_type, TokenType::Refresh);
        assert_ne!(a.jti, b.jti);
    }
}
