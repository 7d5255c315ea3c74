//! `/api/admin/*`. Every handler requires a session and checks its own
//! permission key through the service it calls.

use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{routes::JSON_BODY_LIMIT, state::AppState};

pub mod access;
pub mod audit;
pub mod catalog;
pub mod metrics;
pub mod orders;
pub mod uploads;

pub fn router(upload_body_limit: usize) -> Router<AppState> {
    Router::new()
        .merge(orders::router())
        .merge(catalog::router())
        .merge(access::router())
        .merge(audit::router())
        .merge(metrics::router())
        .layer(RequestBodyLimitLayer::new(JSON_BODY_LIMIT))
        .merge(uploads::router(upload_body_limit))
}
