//! Cookie-held shopping cart.
//!
//! The cart is never stored server-side. The cookie carries
//! `[{"productId", "qty"}]` encoded as base64url JSON; every read is
//! reconciled against live product rows so deleted products fall out and
//! prices are always current.

use std::collections::HashMap;

use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    cookies::{CookieOptions, build_cookie, read_cookie},
    dto::cart::{CartItemView, CartView},
    error::AppError,
    models::Product,
};

pub const CART_COOKIE: &str = "cart";
pub const MAX_QTY_PER_ITEM: i32 = 99;
pub const MAX_CART_LINES: usize = 50;
const CART_COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    #[error("quantity must be greater than 0")]
    InvalidQuantity,
    #[error("cart cannot hold more than {MAX_CART_LINES} different products")]
    Full,
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub qty: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Tolerant decode: anything unreadable is an empty cart, and the
    /// result is normalized (positive, clamped, merged, capped).
    pub fn decode(raw: &str) -> Self {
        let lines: Vec<CartLine> = URL_SAFE_NO_PAD
            .decode(raw.trim())
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();

        let mut cart = Cart::default();
        for line in lines {
            if line.qty <= 0 {
                continue;
            }
            if let Some(existing) = cart.line_mut(line.product_id) {
                existing.qty = existing.qty.saturating_add(line.qty).min(MAX_QTY_PER_ITEM);
            } else if cart.lines.len() < MAX_CART_LINES {
                cart.lines.push(CartLine {
                    product_id: line.product_id,
                    qty: line.qty.min(MAX_QTY_PER_ITEM),
                });
            }
        }
        cart
    }

    pub fn encode(&self) -> String {
        // Serializing plain structs into a Vec cannot fail.
        let json = serde_json::to_vec(&self.lines).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        read_cookie(headers, CART_COOKIE)
            .map(|raw| Cart::decode(&raw))
            .unwrap_or_default()
    }

    pub fn cookie(&self, config: &AppConfig) -> String {
        let max_age_secs = if self.is_empty() { 0 } else { CART_COOKIE_MAX_AGE_SECS };
        build_cookie(
            CART_COOKIE,
            &self.encode(),
            CookieOptions {
                max_age_secs,
                http_only: false,
                secure: config.cookie_secure,
            },
        )
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    pub fn quantity_of(&self, product_id: Uuid) -> Option<i32> {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.qty)
    }

    fn line_mut(&mut self, product_id: Uuid) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }

    /// Adds to an existing line or opens a new one. Returns the resulting
    /// quantity, clamped to `MAX_QTY_PER_ITEM`.
    pub fn add(&mut self, product_id: Uuid, qty: i32) -> Result<i32, CartError> {
        if qty <= 0 {
            return Err(CartError::InvalidQuantity);
        }
        if let Some(line) = self.line_mut(product_id) {
            line.qty = line.qty.saturating_add(qty).min(MAX_QTY_PER_ITEM);
            return Ok(line.qty);
        }
        if self.lines.len() >= MAX_CART_LINES {
            return Err(CartError::Full);
        }
        let qty = qty.min(MAX_QTY_PER_ITEM);
        self.lines.push(CartLine { product_id, qty });
        Ok(qty)
    }

    /// Sets the quantity of a line; zero or less removes it.
    pub fn set(&mut self, product_id: Uuid, qty: i32) -> Result<i32, CartError> {
        if qty <= 0 {
            self.remove(product_id);
            return Ok(0);
        }
        let qty = qty.min(MAX_QTY_PER_ITEM);
        if let Some(line) = self.line_mut(product_id) {
            line.qty = qty;
            return Ok(qty);
        }
        if self.lines.len() >= MAX_CART_LINES {
            return Err(CartError::Full);
        }
        self.lines.push(CartLine { product_id, qty });
        Ok(qty)
    }

    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Prices the cart from live product rows. Lines whose product is gone are
/// dropped; the returned cart is the healed cookie content.
pub fn reconcile(cart: &Cart, products: &HashMap<Uuid, Product>) -> (CartView, Cart) {
    let mut healed = Cart::default();
    let mut items = Vec::with_capacity(cart.lines.len());

    for line in &cart.lines {
        let Some(product) = products.get(&line.product_id) else {
            continue;
        };
        healed.lines.push(*line);
        items.push(CartItemView {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            image_url: product.image_url.clone(),
            unit_price: product.price,
            quantity: line.qty,
            line_total: product.price * i64::from(line.qty),
            in_stock: product.stock >= line.qty,
        });
    }

    let subtotal = items.iter().map(|i| i.line_total).sum();
    let item_count = items.iter().map(|i| i.quantity).sum();
    (
        CartView {
            items,
            subtotal,
            item_count,
        },
        healed,
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(price: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            category_id: None,
            name: "Salmon Kibble".into(),
            slug: "salmon-kibble".into(),
            description: None,
            price,
            stock,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn add_merges_and_clamps() {
        let mut cart = Cart::default();
        let id = Uuid::new_v4();
        assert_eq!(cart.add(id, 2), Ok(2));
        assert_eq!(cart.add(id, 3), Ok(5));
        assert_eq!(cart.add(id, 500), Ok(MAX_QTY_PER_ITEM));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.add(id, 0), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn line_cap_rejects_new_products_only() {
        let mut cart = Cart::default();
        let first = Uuid::new_v4();
        cart.add(first, 1).unwrap();
        for _ in 1..MAX_CART_LINES {
            cart.add(Uuid::new_v4(), 1).unwrap();
        }
        assert_eq!(cart.add(Uuid::new_v4(), 1), Err(CartError::Full));
        assert_eq!(cart.add(first, 1), Ok(2));
    }

    #[test]
    fn set_to_zero_removes() {
        let mut cart = Cart::default();
        let id = Uuid::new_v4();
        cart.add(id, 4).unwrap();
        assert_eq!(cart.set(id, 1), Ok(1));
        assert_eq!(cart.set(id, 0), Ok(0));
        assert!(cart.is_empty());
    }

    #[test]
    fn cookie_value_survives_encoding() {
        let mut cart = Cart::default();
        cart.add(Uuid::new_v4(), 3).unwrap();
        cart.add(Uuid::new_v4(), 1).unwrap();
        assert_eq!(Cart::decode(&cart.encode()), cart);
    }

    #[test]
    fn garbage_cookie_is_empty_cart() {
        assert!(Cart::decode("%%%not-base64").is_empty());
        let not_json = URL_SAFE_NO_PAD.encode(b"{\"oops\":true}");
        assert!(Cart::decode(&not_json).is_empty());
    }

    #[test]
    fn decode_normalizes_hand_edited_cookies() {
        let id = Uuid::new_v4();
        let raw = serde_json::json!([
            { "productId": id, "qty": 60 },
            { "productId": id, "qty": 60 },
            { "productId": Uuid::new_v4(), "qty": -3 },
        ]);
        let encoded = URL_SAFE_NO_PAD.encode(raw.to_string());
        let cart = Cart::decode(&encoded);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(id), Some(MAX_QTY_PER_ITEM));
    }

    #[test]
    fn decode_saturates_repeated_lines_at_the_item_cap() {
        let id = Uuid::new_v4();
        let raw = serde_json::json!([
            { "productId": id, "qty": 1 },
            { "productId": id, "qty": i32::MAX },
            { "productId": id, "qty": i32::MAX },
        ]);
        let cart = Cart::decode(&URL_SAFE_NO_PAD.encode(raw.to_string()));
        assert_eq!(cart.quantity_of(id), Some(MAX_QTY_PER_ITEM));

        let kibble = Product { id, ..product(100, 1_000) };
        let products: HashMap<Uuid, Product> = [(id, kibble)].into_iter().collect();
        let (view, _) = reconcile(&cart, &products);
        assert_eq!(view.subtotal, 100 * i64::from(MAX_QTY_PER_ITEM));
    }

    #[test]
    fn reconcile_drops_missing_products_and_uses_live_prices() {
        let food = product(1_250, 10);
        let toy = product(499, 1);
        let deleted = Uuid::new_v4();

        let mut cart = Cart::default();
        cart.add(food.id, 2).unwrap();
        cart.add(deleted, 5).unwrap();
        cart.add(toy.id, 3).unwrap();

        let products: HashMap<Uuid, Product> =
            [(food.id, food.clone()), (toy.id, toy.clone())].into_iter().collect();
        let (view, healed) = reconcile(&cart, &products);

        assert_eq!(view.items.len(), 2);
        assert!(view.items.iter().all(|i| i.product_id != deleted));
        assert_eq!(view.subtotal, 2 * 1_250 + 3 * 499);
        assert_eq!(view.item_count, 5);
        assert!(!view.items[1].in_stock);
        assert_eq!(healed.quantity_of(deleted), None);
        assert_eq!(healed.lines().len(), 2);
    }

    #[test]
    fn reconcile_of_empty_cart_is_zero() {
        let (view, healed) = reconcile(&Cart::default(), &HashMap::new());
        assert!(view.items.is_empty());
        assert_eq!(view.subtotal, 0);
        assert!(healed.is_empty());
    }
}
