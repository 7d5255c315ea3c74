use std::collections::HashMap;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    cart::{Cart, reconcile},
    dto::cart::{AddToCartRequest, CartView, UpdateCartRequest},
    entity::products::{Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
    models::Product,
    state::AppState,
};

/// Result of a cart operation: the priced view plus the cookie content to
/// send back (`None` when the cookie does not need rewriting).
pub struct CartOutcome {
    pub view: CartView,
    pub cart: Option<Cart>,
}

pub async fn load_products(state: &AppState, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Product>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let products = Products::find()
        .filter(ProdCol::Id.is_in(ids.iter().copied()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| (p.id, Product::from(p)))
        .collect();
    Ok(products)
}

/// Prices the cart against live rows. The healed cart is returned so
/// lines for deleted products disappear from the cookie as well.
pub async fn price_cart(state: &AppState, cart: &Cart) -> AppResult<(CartView, Cart)> {
    let products = load_products(state, &cart.product_ids()).await?;
    Ok(reconcile(cart, &products))
}

pub async fn get_cart(state: &AppState, cart: Cart) -> AppResult<CartOutcome> {
    let (view, healed) = price_cart(state, &cart).await?;
    let changed = healed != cart;
    Ok(CartOutcome {
        view,
        cart: changed.then_some(healed),
    })
}

async fn ensure_product(state: &AppState, product_id: Uuid) -> AppResult<()> {
    if Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest("product not found".to_string()));
    }
    Ok(())
}

pub async fn add_to_cart(
    state: &AppState,
    mut cart: Cart,
    payload: AddToCartRequest,
) -> AppResult<CartOutcome> {
    ensure_product(state, payload.product_id).await?;
    cart.add(payload.product_id, payload.quantity)?;
    let (view, healed) = price_cart(state, &cart).await?;
    Ok(CartOutcome {
        view,
        cart: Some(healed),
    })
}

pub async fn update_cart(
    state: &AppState,
    mut cart: Cart,
    payload: UpdateCartRequest,
) -> AppResult<CartOutcome> {
    if payload.quantity > 0 {
        ensure_product(state, payload.product_id).await?;
    }
    cart.set(payload.product_id, payload.quantity)?;
    let (view, healed) = price_cart(state, &cart).await?;
    Ok(CartOutcome {
        view,
        cart: Some(healed),
    })
}

pub async fn remove_from_cart(
    state: &AppState,
    mut cart: Cart,
    product_id: Option<Uuid>,
) -> AppResult<CartOutcome> {
    match product_id {
        Some(id) => {
            if !cart.remove(id) {
                return Err(AppError::NotFound);
            }
        }
        None => cart.clear(),
    }
    let (view, healed) = price_cart(state, &cart).await?;
    Ok(CartOutcome {
        view,
        cart: Some(healed),
    })
}
