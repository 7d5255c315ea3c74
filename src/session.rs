//! Signed session tokens.
//!
//! A session is an HS256 JWT carrying the user id, email and legacy role. It
//! travels in the `session` cookie for browser clients or in an
//! `Authorization: Bearer` header for API clients.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    cookies::{CookieOptions, build_cookie, expire_cookie},
    error::{AppError, AppResult},
};

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

pub fn issue_token(
    secret: &str,
    ttl_hours: i64,
    user_id: Uuid,
    email: &str,
    role: &str,
) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| AppError::internal("Failed to set expiration"))?;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AppError::internal)
}

/// Claims of a token whose signature and expiry check out.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

pub fn session_cookie(config: &AppConfig, token: &str) -> String {
    build_cookie(
        SESSION_COOKIE,
        token,
        CookieOptions {
            max_age_secs: config.session_ttl_hours * 3600,
            http_only: true,
            secure: config.cookie_secure,
        },
    )
}

pub fn clear_session_cookie() -> String {
    expire_cookie(SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_verifies() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, 1, user_id, "vet@petshop.test", "customer").unwrap();
        let claims = verify_token(SECRET, &token).expect("valid token");
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "vet@petshop.test");
        assert_eq!(claims.role, "customer");
    }

    #[test]
    fn wrong_secret_or_tampering_is_rejected() {
        let token = issue_token(SECRET, 1, Uuid::new_v4(), "a@b.test", "customer").unwrap();
        assert!(verify_token("other-secret", &token).is_none());

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(verify_token(SECRET, &tampered).is_none());
        assert!(verify_token(SECRET, "not-a-token").is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(SECRET, -2, Uuid::new_v4(), "a@b.test", "customer").unwrap();
        assert!(verify_token(SECRET, &token).is_none());
    }

    #[test]
    fn cookie_lifetime_follows_config() {
        let config = AppConfig::with_defaults("postgres://localhost/test", SECRET);
        let cookie = session_cookie(&config, "abc");
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("HttpOnly"));
    }
}
