use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::{Expr, LockType};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    cart::Cart,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, Product},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
    validation::FieldErrors,
};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CANCELLED: &str = "cancelled";
pub const ORDER_STATUSES: [&str; 5] = ["pending", "paid", "shipped", "completed", "cancelled"];

/// Order line priced at checkout time.
#[derive(Debug, Clone, PartialEq)]
pub struct LineDraft {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

/// Prices cart lines from live products. Lines for missing products are
/// skipped; a line exceeding stock fails the whole checkout.
pub fn draft_lines(
    cart: &Cart,
    products: &HashMap<Uuid, Product>,
) -> AppResult<(Vec<LineDraft>, i64)> {
    let mut lines = Vec::with_capacity(cart.lines().len());
    for line in cart.lines() {
        let Some(product) = products.get(&line.product_id) else {
            continue;
        };
        if line.qty <= 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid quantity for {}",
                product.name
            )));
        }
        if product.stock < line.qty {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        lines.push(LineDraft {
            product_id: product.id,
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            unit_price: product.price,
            quantity: line.qty,
            line_total: product.price * i64::from(line.qty),
        });
    }
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    let subtotal = lines.iter().map(|l| l.line_total).sum();
    Ok((lines, subtotal))
}

fn validate_checkout(payload: &CheckoutRequest) -> AppResult<()> {
    let mut errors = FieldErrors::default();
    errors.required("shipping_name", &payload.shipping_name, 120);
    errors.required("shipping_address", &payload.shipping_address, 255);
    errors.required("shipping_city", &payload.shipping_city, 120);
    errors.required("shipping_postal_code", &payload.shipping_postal_code, 20);
    errors.finish()
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    cart: &Cart,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    validate_checkout(&payload)?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let txn = state.orm.begin().await?;

    let products: HashMap<Uuid, Product> = Products::find()
        .filter(ProdCol::Id.is_in(cart.product_ids()))
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, Product::from(p)))
        .collect();

    let (lines, subtotal) = draft_lines(cart, &products)?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(user.user_id)),
        email: Set(user.email.clone()),
        status: Set(STATUS_PENDING.into()),
        subtotal: Set(subtotal),
        // No tax or shipping is persisted at creation.
        total: Set(subtotal),
        shipping_name: Set(payload.shipping_name.trim().to_string()),
        shipping_address: Set(payload.shipping_address.trim().to_string()),
        shipping_city: Set(payload.shipping_city.trim().to_string()),
        shipping_postal_code: Set(payload.shipping_postal_code.trim().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(line.product_id)),
            product_name: Set(line.product_name.clone()),
            product_slug: Set(line.product_slug.clone()),
            unit_price: Set(line.unit_price),
            quantity: Set(line.quantity),
            line_total: Set(line.line_total),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(item));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(line.product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    tracing::info!(order_id = %order.id, user_id = %user.user_id, total = order.total, "order placed");
    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("checkout", "orders")
            .entity(order.id)
            .metadata(serde_json::json!({ "total": order.total, "lines": items.len() })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Checkout success",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
    Ok(ApiResponse::paged("Ok", OrderList { items: orders }, meta))
}

pub async fn load_order_items(state: &AppState, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    Ok(items)
}

/// Another user's order is reported as missing, not forbidden.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_order_items(state, order.id).await?;

    Ok(ApiResponse::ok(
        "OK",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(name: &str, price: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            category_id: None,
            name: name.into(),
            slug: name.to_lowercase(),
            description: None,
            price,
            stock,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn catalog(products: &[&Product]) -> HashMap<Uuid, Product> {
        products.iter().map(|p| (p.id, (*p).clone())).collect()
    }

    #[test]
    fn subtotal_is_sum_of_line_totals() {
        let food = product("Food", 2_499, 10);
        let bowl = product("Bowl", 899, 10);
        let mut cart = Cart::default();
        cart.add(food.id, 3).unwrap();
        cart.add(bowl.id, 2).unwrap();

        let (lines, subtotal) = draft_lines(&cart, &catalog(&[&food, &bowl])).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(subtotal, 3 * 2_499 + 2 * 899);
        assert_eq!(subtotal, lines.iter().map(|l| l.unit_price * i64::from(l.quantity)).sum::<i64>());
        assert_eq!(lines[0].product_name, "Food");
        assert_eq!(lines[0].product_slug, "food");
    }

    #[test]
    fn missing_products_are_skipped() {
        let food = product("Food", 1_000, 10);
        let mut cart = Cart::default();
        cart.add(food.id, 1).unwrap();
        cart.add(Uuid::new_v4(), 4).unwrap();

        let (lines, subtotal) = draft_lines(&cart, &catalog(&[&food])).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(subtotal, 1_000);
    }

    #[test]
    fn cart_of_only_deleted_products_is_empty() {
        let mut cart = Cart::default();
        cart.add(Uuid::new_v4(), 1).unwrap();
        assert!(matches!(
            draft_lines(&cart, &HashMap::new()),
            Err(AppError::BadRequest(msg)) if msg == "Cart is empty"
        ));
    }

    #[test]
    fn stock_shortage_fails_checkout() {
        let toy = product("Toy", 500, 1);
        let mut cart = Cart::default();
        cart.add(toy.id, 2).unwrap();
        assert!(matches!(
            draft_lines(&cart, &catalog(&[&toy])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn overflowing_cookie_quantities_never_go_negative() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let food = product("Food", 1_000, 500);
        let raw = serde_json::json!([
            { "productId": food.id, "qty": 1 },
            { "productId": food.id, "qty": i32::MAX },
        ]);
        let cart = Cart::decode(&URL_SAFE_NO_PAD.encode(raw.to_string()));

        let (lines, subtotal) = draft_lines(&cart, &catalog(&[&food])).unwrap();
        assert_eq!(lines[0].quantity, crate::cart::MAX_QTY_PER_ITEM);
        assert!(subtotal > 0);
        assert_eq!(subtotal, 1_000 * i64::from(crate::cart::MAX_QTY_PER_ITEM));
    }

    #[test]
    fn checkout_requires_shipping_fields() {
        let payload = CheckoutRequest {
            shipping_name: "Sam".into(),
            shipping_address: " ".into(),
            shipping_city: "Portland".into(),
            shipping_postal_code: "".into(),
        };
        match validate_checkout(&payload) {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("shipping_address").is_some());
                assert!(errors.get("shipping_postal_code").is_some());
                assert!(errors.get("shipping_name").is_none());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
