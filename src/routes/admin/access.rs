use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use uuid::Uuid;

use crate::{
    dto::admin::{
        AssignRolesRequest, CreatePermissionRequest, CreateRoleRequest, PermissionList, RoleList,
        RoleWithPermissions, SetRolePermissionsRequest, UpdateRoleRequest, UpdateUserRequest,
        UserList, UserWithRoles,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Permission, User},
    response::ApiResponse,
    routes::params::UserListQuery,
    services::{role_service, user_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/users/{id}/roles", put(assign_roles))
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/{id}",
            get(get_role).patch(update_role).delete(delete_role),
        )
        .route("/roles/{id}/permissions", put(set_role_permissions))
        .route("/permissions", get(list_permissions).post(create_permission))
        .route("/permissions/{id}", delete(delete_permission))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users, newest first", body = ApiResponse<UserList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::list_users(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User with assigned roles", body = ApiResponse<UserWithRoles>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserWithRoles>>> {
    let resp = user_service::get_user(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = user_service::update_user(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/roles",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AssignRolesRequest,
    responses(
        (status = 200, description = "Role assignments replaced", body = ApiResponse<UserWithRoles>),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Unknown role"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn assign_roles(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRolesRequest>,
) -> AppResult<Json<ApiResponse<UserWithRoles>>> {
    let resp = user_service::assign_roles(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = user_service::delete_user(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/roles",
    responses(
        (status = 200, description = "Roles with permission keys", body = ApiResponse<RoleList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn list_roles(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RoleList>>> {
    let resp = role_service::list_roles(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role with permission keys", body = ApiResponse<RoleWithPermissions>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn get_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RoleWithPermissions>>> {
    let resp = role_service::get_role(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created", body = ApiResponse<RoleWithPermissions>),
        (status = 409, description = "Name already taken"),
        (status = 422, description = "Validation failed or unknown permission key"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn create_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RoleWithPermissions>>)> {
    let resp = role_service::create_role(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = ApiResponse<RoleWithPermissions>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Name already taken"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<RoleWithPermissions>>> {
    let resp = role_service::update_role(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/admin/roles/{id}/permissions",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = SetRolePermissionsRequest,
    responses(
        (status = 200, description = "Permission keys replaced", body = ApiResponse<RoleWithPermissions>),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Unknown permission key"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRolePermissionsRequest>,
) -> AppResult<Json<ApiResponse<RoleWithPermissions>>> {
    let resp = role_service::set_role_permissions(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 200, description = "Role deleted"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn delete_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = role_service::delete_role(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/permissions",
    responses(
        (status = 200, description = "All permission keys", body = ApiResponse<PermissionList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PermissionList>>> {
    let resp = role_service::list_permissions(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/permissions",
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission created", body = ApiResponse<Permission>),
        (status = 409, description = "Key already exists"),
        (status = 422, description = "Key is not resource:action"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn create_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePermissionRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Permission>>)> {
    let resp = role_service::create_permission(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/permissions/{id}",
    params(("id" = Uuid, Path, description = "Permission ID")),
    responses(
        (status = 200, description = "Permission deleted"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Access"
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = role_service::delete_permission(&state, &user, id).await?;
    Ok(Json(resp))
}
