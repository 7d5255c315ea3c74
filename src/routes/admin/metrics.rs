use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    dto::metrics::{ExportQuery, MetricsQuery},
    error::{AppError, AppResult},
    metrics::Dashboard,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::metrics_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(dashboard))
        .route("/metrics/export", get(export))
}

#[utoipa::path(
    get,
    path = "/api/admin/metrics",
    params(MetricsQuery),
    responses(
        (status = 200, description = "Sales dashboard for the range", body = ApiResponse<Dashboard>),
        (status = 400, description = "Invalid range"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Metrics"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<MetricsQuery>,
) -> AppResult<Json<ApiResponse<Dashboard>>> {
    let resp = metrics_service::get_dashboard(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/metrics/export",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV or JSON attachment", content_type = "text/csv"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Metrics"
)]
pub async fn export(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    let export = metrics_service::export(&state, &user, query).await?;
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", export.file_name))
            .map_err(AppError::internal)?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(export.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response())
}
