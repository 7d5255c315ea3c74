use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::{
    dto::admin::AuditLogList,
    entity::audit_logs::{Column as AuditCol, Entity as AuditLogs},
    error::AppResult,
    middleware::auth::AuthUser,
    models::AuditLog,
    rbac::{self, keys},
    response::{ApiResponse, Meta},
    routes::params::AuditLogQuery,
    state::AppState,
};

/// Newest first, optionally narrowed by action, entity type or actor.
pub async fn list_audit_logs(
    state: &AppState,
    user: &AuthUser,
    query: AuditLogQuery,
) -> AppResult<ApiResponse<AuditLogList>> {
    rbac::require_permission(state, user, keys::AUDIT_READ).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(action) = query.action.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(AuditCol::Action.eq(action.clone()));
    }
    if let Some(entity_type) = query.entity_type.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(AuditCol::EntityType.eq(entity_type.clone()));
    }
    if let Some(actor_id) = query.actor_id {
        condition = condition.add(AuditCol::ActorId.eq(actor_id));
    }

    let finder = AuditLogs::find()
        .filter(condition)
        .order_by_desc(AuditCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(AuditLog::from)
        .collect();

    Ok(ApiResponse::paged(
        "Audit logs",
        AuditLogList { items },
        Meta::new(page, limit, total),
    ))
}
