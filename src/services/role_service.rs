use std::collections::BTreeSet;

use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseTransaction, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    dto::admin::{
        CreatePermissionRequest, CreateRoleRequest, PermissionList, RoleList, RoleWithPermissions,
        SetRolePermissionsRequest, UpdateRoleRequest,
    },
    entity::{
        permissions::{ActiveModel as PermissionActive, Column as PermCol, Entity as Permissions},
        role_permissions::{
            ActiveModel as RolePermissionActive, Column as RolePermCol, Entity as RolePermissions,
        },
        roles::{ActiveModel as RoleActive, Column as RoleCol, Entity as Roles, Model as RoleModel},
    },
    error::{AppError, AppResult, map_unique_violation},
    middleware::auth::AuthUser,
    models::{Permission, Role},
    rbac::{self, keys},
    response::ApiResponse,
    state::AppState,
    validation::{FieldErrors, is_valid_permission_key},
};

const DUPLICATE_ROLE: &str = "A role with this name already exists";
const DUPLICATE_PERMISSION: &str = "A permission with this key already exists";

async fn with_permissions(state: &AppState, role: RoleModel) -> AppResult<RoleWithPermissions> {
    let mut permissions: Vec<String> = role
        .find_related(Permissions)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| p.key)
        .collect();
    permissions.sort();
    Ok(RoleWithPermissions {
        role: Role::from(role),
        permissions,
    })
}

/// Maps keys to permission ids; unknown keys are a validation error.
async fn resolve_keys(state: &AppState, requested: &[String]) -> AppResult<Vec<Uuid>> {
    let wanted: BTreeSet<&str> = requested.iter().map(|k| k.trim()).collect();
    if wanted.is_empty() {
        return Ok(vec![]);
    }
    let found = Permissions::find()
        .filter(PermCol::Key.is_in(wanted.iter().copied()))
        .all(&state.orm)
        .await?;

    let known: BTreeSet<&str> = found.iter().map(|p| p.key.as_str()).collect();
    let unknown: Vec<&str> = wanted.difference(&known).copied().collect();
    if !unknown.is_empty() {
        let mut errors = FieldErrors::default();
        errors.add("permissions", format!("unknown permission keys: {}", unknown.join(", ")));
        return Err(AppError::Validation(errors));
    }
    Ok(found.into_iter().map(|p| p.id).collect())
}

async fn replace_role_permissions(
    txn: &DatabaseTransaction,
    role_id: Uuid,
    permission_ids: &[Uuid],
) -> AppResult<()> {
    RolePermissions::delete_many()
        .filter(RolePermCol::RoleId.eq(role_id))
        .exec(txn)
        .await?;
    if !permission_ids.is_empty() {
        RolePermissions::insert_many(permission_ids.iter().map(|permission_id| {
            RolePermissionActive {
                role_id: Set(role_id),
                permission_id: Set(*permission_id),
            }
        }))
        .exec_without_returning(txn)
        .await?;
    }
    Ok(())
}

pub async fn list_roles(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<RoleList>> {
    rbac::require_permission(state, user, keys::ROLE_READ).await?;
    let rows = Roles::find()
        .order_by_asc(RoleCol::Name)
        .find_with_related(Permissions)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .map(|(role, perms)| {
            let mut permissions: Vec<String> = perms.into_iter().map(|p| p.key).collect();
            permissions.sort();
            RoleWithPermissions {
                role: Role::from(role),
                permissions,
            }
        })
        .collect();
    Ok(ApiResponse::ok("Roles", RoleList { items }))
}

pub async fn get_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<RoleWithPermissions>> {
    rbac::require_permission(state, user, keys::ROLE_READ).await?;
    let role = Roles::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("Role", with_permissions(state, role).await?))
}

pub async fn create_role(
    state: &AppState,
    user: &AuthUser,
    payload: CreateRoleRequest,
) -> AppResult<ApiResponse<RoleWithPermissions>> {
    rbac::require_permission(state, user, keys::ROLE_CREATE).await?;
    let mut errors = FieldErrors::default();
    errors.required("name", &payload.name, 60);
    errors.finish()?;

    let permission_ids = resolve_keys(state, &payload.permissions).await?;

    let txn = state.orm.begin().await?;
    let role = RoleActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        created_at: NotSet,
    }
    .insert(&txn)
    .await
    .map_err(|e| map_unique_violation(e, DUPLICATE_ROLE))?;
    replace_role_permissions(&txn, role.id, &permission_ids).await?;
    txn.commit().await?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("role_create", "roles")
            .entity(role.id)
            .metadata(serde_json::json!({ "name": role.name, "permissions": payload.permissions })),
    )
    .await;

    Ok(ApiResponse::ok("Role created", with_permissions(state, role).await?))
}

pub async fn update_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<RoleWithPermissions>> {
    rbac::require_permission(state, user, keys::ROLE_UPDATE).await?;
    let mut errors = FieldErrors::default();
    if let Some(name) = &payload.name {
        errors.required("name", name, 60);
    }
    errors.finish()?;

    let existing = Roles::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: RoleActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    let role = active
        .update(&state.orm)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_ROLE))?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("role_update", "roles").entity(role.id),
    )
    .await;

    Ok(ApiResponse::ok("Updated", with_permissions(state, role).await?))
}

pub async fn set_role_permissions(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: SetRolePermissionsRequest,
) -> AppResult<ApiResponse<RoleWithPermissions>> {
    rbac::require_permission(state, user, keys::ROLE_UPDATE).await?;
    let role = Roles::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let permission_ids = resolve_keys(state, &payload.permissions).await?;

    let txn = state.orm.begin().await?;
    replace_role_permissions(&txn, role.id, &permission_ids).await?;
    txn.commit().await?;

    // Any number of users may hold this role.
    state.permissions.invalidate_all();

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("role_permissions_set", "roles")
            .entity(role.id)
            .metadata(serde_json::json!({ "permissions": payload.permissions })),
    )
    .await;

    Ok(ApiResponse::ok("Permissions updated", with_permissions(state, role).await?))
}

pub async fn delete_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    rbac::require_permission(state, user, keys::ROLE_DELETE).await?;
    let result = Roles::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    state.permissions.invalidate_all();

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("role_delete", "roles").entity(id),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", serde_json::json!({})))
}

pub async fn list_permissions(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PermissionList>> {
    rbac::require_permission(state, user, keys::PERMISSION_READ).await?;
    let items = Permissions::find()
        .order_by_asc(PermCol::Key)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Permission::from)
        .collect();
    Ok(ApiResponse::ok("Permissions", PermissionList { items }))
}

pub async fn create_permission(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePermissionRequest,
) -> AppResult<ApiResponse<Permission>> {
    rbac::require_permission(state, user, keys::PERMISSION_CREATE).await?;
    let key = payload.key.trim().to_string();
    if !is_valid_permission_key(&key) {
        let mut errors = FieldErrors::default();
        errors.add("key", "must look like resource:action");
        return Err(AppError::Validation(errors));
    }

    let permission = PermissionActive {
        id: Set(Uuid::new_v4()),
        key: Set(key),
        description: Set(payload.description),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| map_unique_violation(e, DUPLICATE_PERMISSION))?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("permission_create", "permissions")
            .entity(permission.id)
            .metadata(serde_json::json!({ "key": permission.key })),
    )
    .await;

    Ok(ApiResponse::ok("Permission created", Permission::from(permission)))
}

pub async fn delete_permission(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    rbac::require_permission(state, user, keys::PERMISSION_DELETE).await?;
    let result = Permissions::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    state.permissions.invalidate_all();

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("permission_delete", "permissions").entity(id),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", serde_json::json!({})))
}
