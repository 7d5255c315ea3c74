use axum::{
    Router,
    http::{HeaderMap, HeaderValue, header},
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;

/// Request body cap for every JSON route. Uploads carry their own limit.
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router(upload_body_limit: usize) -> Router<AppState> {
    Router::new()
        .merge(catalog::router())
        .nest("/auth", auth::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT))
        .nest("/admin", admin::router(upload_body_limit))
}

/// One `Set-Cookie` header per cookie string.
pub fn set_cookies<I>(cookies: I) -> AppResult<HeaderMap>
where
    I: IntoIterator<Item = String>,
{
    let mut headers = HeaderMap::new();
    for cookie in cookies {
        let value = HeaderValue::from_str(&cookie).map_err(AppError::internal)?;
        headers.append(header::SET_COOKIE, value);
    }
    Ok(headers)
}
