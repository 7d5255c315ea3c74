use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use uuid::Uuid;

use crate::{
    cart::Cart,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::{params::OrderListQuery, set_cookies},
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(checkout))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order placed from the cart; the cart cookie is cleared", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty cart or insufficient stock"),
        (status = 401, description = "Not signed in"),
        (status = 422, description = "Invalid shipping details")
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<ApiResponse<OrderWithItems>>)> {
    let cart = Cart::from_headers(&headers);
    let resp = order_service::checkout(&state, &user, &cart, payload).await?;
    let cleared = set_cookies([Cart::default().cookie(&state.config)])?;
    Ok((StatusCode::CREATED, cleared, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "The caller's orders", body = ApiResponse<OrderList>),
        (status = 401, description = "Not signed in")
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}
