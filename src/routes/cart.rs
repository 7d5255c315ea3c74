use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};

use crate::{
    cart::Cart,
    dto::cart::{AddToCartRequest, CartView, RemoveFromCartQuery, UpdateCartRequest},
    error::AppResult,
    response::ApiResponse,
    routes::set_cookies,
    services::cart_service::{self, CartOutcome},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(get_cart)
            .post(add_to_cart)
            .put(update_cart)
            .delete(remove_from_cart),
    )
}

/// Priced view plus a `Set-Cookie` whenever the stored lines changed.
fn respond(
    state: &AppState,
    message: &str,
    outcome: CartOutcome,
) -> AppResult<(HeaderMap, Json<ApiResponse<CartView>>)> {
    let cookies = outcome.cart.map(|cart| cart.cookie(&state.config));
    Ok((set_cookies(cookies)?, Json(ApiResponse::ok(message, outcome.view))))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart priced against the live catalog", body = ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<(HeaderMap, Json<ApiResponse<CartView>>)> {
    let outcome = cart_service::get_cart(&state, Cart::from_headers(&headers)).await?;
    respond(&state, "Cart", outcome)
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added", body = ApiResponse<CartView>),
        (status = 400, description = "Unknown product, bad quantity or full cart")
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<(HeaderMap, Json<ApiResponse<CartView>>)> {
    let outcome = cart_service::add_to_cart(&state, Cart::from_headers(&headers), payload).await?;
    respond(&state, "Added to cart", outcome)
}

#[utoipa::path(
    put,
    path = "/api/cart",
    request_body = UpdateCartRequest,
    responses(
        (status = 200, description = "Quantity set; zero or less removes the line", body = ApiResponse<CartView>)
    ),
    tag = "Cart"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateCartRequest>,
) -> AppResult<(HeaderMap, Json<ApiResponse<CartView>>)> {
    let outcome = cart_service::update_cart(&state, Cart::from_headers(&headers), payload).await?;
    respond(&state, "Cart updated", outcome)
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    params(RemoveFromCartQuery),
    responses(
        (status = 200, description = "Line removed, or the whole cart cleared", body = ApiResponse<CartView>),
        (status = 404, description = "Product not in cart")
    ),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RemoveFromCartQuery>,
) -> AppResult<(HeaderMap, Json<ApiResponse<CartView>>)> {
    let outcome =
        cart_service::remove_from_cart(&state, Cart::from_headers(&headers), query.product_id)
            .await?;
    respond(&state, "Removed from cart", outcome)
}
