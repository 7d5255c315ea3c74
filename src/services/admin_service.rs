use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    dto::orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Order,
    rbac::{self, keys},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::{ORDER_STATUSES, load_order_items},
    state::AppState,
    validation::FieldErrors,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    rbac::require_permission(state, user, keys::ORDER_READ).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);

    Ok(ApiResponse::paged("Orders", OrderList { items: orders }, meta))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // Staff allowed to change an order can always open it.
    rbac::require_any(state, user, &[keys::ORDER_READ, keys::ORDER_UPDATE]).await?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(Order::from)
        .ok_or(AppError::NotFound)?;

    let items = load_order_items(state, order.id).await?;

    Ok(ApiResponse::ok("Order found", OrderWithItems { order, items }))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    rbac::require_permission(state, user, keys::ORDER_UPDATE).await?;
    validate_order_status(&payload.status)?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let previous = existing.status.clone();
    let mut active: OrderActive = existing.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("order_status_update", "orders")
            .entity(order.id)
            .metadata(serde_json::json!({ "from": previous, "to": order.status })),
    )
    .await;

    Ok(ApiResponse::ok("Order updated", Order::from(order)))
}

fn validate_order_status(status: &str) -> AppResult<()> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        let mut errors = FieldErrors::default();
        errors.add("status", format!("must be one of {}", ORDER_STATUSES.join(", ")));
        Err(AppError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_statuses_are_accepted() {
        for status in ORDER_STATUSES {
            assert!(validate_order_status(status).is_ok());
        }
        assert!(matches!(
            validate_order_status("lost"),
            Err(AppError::Validation(_))
        ));
    }
}
