use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    audit::{self, AuditEntry},
    dto::auth::{LoginRequest, LoginResponse, MeResponse, RegisterRequest},
    error::AppResult,
    middleware::auth::{AuthUser, MaybeUser},
    models::User,
    response::ApiResponse,
    routes::set_cookies,
    services::auth_service::{login_user, me, register_user},
    session::{clear_session_cookie, session_cookie},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(current_user))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register user", body = ApiResponse<User>),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user, sets the session cookie", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(axum::http::HeaderMap, Json<ApiResponse<LoginResponse>>)> {
    let resp = login_user(&state, payload).await?;
    let mut cookies = Vec::new();
    if let Some(data) = &resp.data {
        cookies.push(session_cookie(&state.config, &data.token));
    }
    Ok((set_cookies(cookies)?, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie expired", body = ApiResponse<serde_json::Value>)
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    user: MaybeUser,
) -> AppResult<(axum::http::HeaderMap, Json<ApiResponse<serde_json::Value>>)> {
    if let Some(user) = user {
        audit::record(
            &state,
            Some(user.user_id),
            AuditEntry::new("user_logout", "users").entity(user.user_id),
        )
        .await;
    }
    let headers = set_cookies([clear_session_cookie()])?;
    Ok((
        headers,
        Json(ApiResponse::ok("Logged out", serde_json::json!({}))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user with roles and permissions", body = ApiResponse<MeResponse>),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Auth"
)]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let resp = me(&state, &user).await?;
    Ok(Json(resp))
}
