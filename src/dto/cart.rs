use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartRequest {
    pub product_id: Uuid,
    /// Zero or less removes the line.
    pub quantity: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RemoveFromCartQuery {
    /// Omit to clear the whole cart.
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemView {
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: i64,
    pub item_count: i32,
}
