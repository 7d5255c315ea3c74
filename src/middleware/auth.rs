use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use uuid::Uuid;

use crate::{
    cookies::read_cookie,
    error::AppError,
    session::{SESSION_COOKIE, verify_token},
    state::AppState,
};

/// Authenticated caller, taken from the session cookie or a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    /// Legacy role from the token; informational only.
    pub role: String,
}

/// Caller when signed in, `None` for anonymous requests.
pub type MaybeUser = Option<AuthUser>;

fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| read_cookie(headers, SESSION_COOKIE))
}

fn authenticate(parts: &Parts, state: &AppState) -> Option<AuthUser> {
    let token = session_token(&parts.headers)?;
    let claims = verify_token(&state.config.session_secret, &token)?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;
    Some(AuthUser {
        user_id,
        email: claims.email,
        role: claims.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).ok_or(AppError::Unauthenticated)
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(authenticate(parts, state))
    }
}
