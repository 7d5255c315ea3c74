use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::admin::AuditLogList,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::AuditLogQuery,
    services::audit_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/audit-logs", get(list_audit_logs))
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit entries, newest first", body = ApiResponse<AuditLogList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Admin"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AuditLogQuery>,
) -> AppResult<Json<ApiResponse<AuditLogList>>> {
    let resp = audit_service::list_audit_logs(&state, &user, query).await?;
    Ok(Json(resp))
}
