use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    dto::admin::{AssignRolesRequest, UpdateUserRequest, UserList, UserWithRoles},
    entity::{
        roles::{Column as RoleCol, Entity as Roles},
        user_roles::{ActiveModel as UserRoleActive, Column as UserRoleCol, Entity as UserRoles},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, User},
    rbac::{self, keys},
    response::{ApiResponse, Meta},
    routes::params::UserListQuery,
    state::AppState,
    validation::FieldErrors,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    rbac::require_permission(state, user, keys::USER_READ).await?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(q) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{q}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(UserCol::Email).ilike(pattern.clone()))
                .add(Expr::col(UserCol::Name).ilike(pattern)),
        );
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::paged(
        "Users",
        UserList { items },
        Meta::new(page, limit, total),
    ))
}

async fn user_with_roles(state: &AppState, id: Uuid) -> AppResult<UserWithRoles> {
    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let roles = user
        .find_related(Roles)
        .order_by_asc(RoleCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Role::from)
        .collect();
    Ok(UserWithRoles {
        user: User::from(user),
        roles,
    })
}

pub async fn get_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<UserWithRoles>> {
    rbac::require_permission(state, user, keys::USER_READ).await?;
    Ok(ApiResponse::ok("User", user_with_roles(state, id).await?))
}

pub async fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    rbac::require_permission(state, user, keys::USER_UPDATE).await?;

    let mut errors = FieldErrors::default();
    if let Some(name) = &payload.name {
        errors.required("name", name, 120);
    }
    if let Some(role) = &payload.role {
        errors.required("role", role, 50);
    }
    errors.finish()?;

    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: UserActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(Some(name.trim().to_string()));
    }
    if let Some(role) = payload.role {
        active.role = Set(role.trim().to_string());
    }
    let updated = active.update(&state.orm).await?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("user_update", "users")
            .entity(updated.id)
            .metadata(serde_json::json!({ "role": updated.role })),
    )
    .await;

    Ok(ApiResponse::ok("Updated", User::from(updated)))
}

/// Replaces the user's role assignments.
pub async fn assign_roles(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AssignRolesRequest,
) -> AppResult<ApiResponse<UserWithRoles>> {
    rbac::require_permission(state, user, keys::USER_UPDATE).await?;

    if Users::find_by_id(id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let role_ids: Vec<Uuid> = payload
        .role_ids
        .into_iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let found = Roles::find()
        .filter(RoleCol::Id.is_in(role_ids.clone()))
        .count(&state.orm)
        .await? as usize;
    if found != role_ids.len() {
        let mut errors = FieldErrors::default();
        errors.add("role_ids", "one or more roles do not exist");
        return Err(AppError::Validation(errors));
    }

    let txn = state.orm.begin().await?;
    UserRoles::delete_many()
        .filter(UserRoleCol::UserId.eq(id))
        .exec(&txn)
        .await?;
    if !role_ids.is_empty() {
        UserRoles::insert_many(role_ids.iter().map(|role_id| UserRoleActive {
            user_id: Set(id),
            role_id: Set(*role_id),
            created_at: NotSet,
        }))
        .exec_without_returning(&txn)
        .await?;
    }
    txn.commit().await?;

    state.permissions.invalidate(id);

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("user_roles_assign", "users")
            .entity(id)
            .metadata(serde_json::json!({ "role_ids": role_ids })),
    )
    .await;

    Ok(ApiResponse::ok("Roles assigned", user_with_roles(state, id).await?))
}

pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    rbac::require_permission(state, user, keys::USER_DELETE).await?;
    if id == user.user_id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }

    let result = Users::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    state.permissions.invalidate(id);

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("user_delete", "users").entity(id),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", serde_json::json!({})))
}
