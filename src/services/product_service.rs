use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    dto::catalog::{CreateProductRequest, UpdateProductRequest},
    entity::{
        categories::Entity as Categories,
        products::{ActiveModel, Entity as Products},
    },
    error::{AppError, AppResult, map_unique_violation},
    middleware::auth::AuthUser,
    models::Product,
    rbac::{self, keys},
    response::ApiResponse,
    state::AppState,
    validation::{FieldErrors, slugify},
};

const NAME_MAX: usize = 200;
const DUPLICATE_SLUG: &str = "A product with this slug already exists";

fn validate_create(payload: &CreateProductRequest) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::default();
    errors.required("name", &payload.name, NAME_MAX);
    errors.non_negative("price", payload.price);
    errors.non_negative("stock", i64::from(payload.stock));

    let slug = match &payload.slug {
        Some(slug) => slug.trim().to_string(),
        None => slugify(&payload.name),
    };
    errors.slug("slug", &slug);

    if errors.is_empty() { Ok(slug) } else { Err(errors) }
}

fn validate_update(payload: &UpdateProductRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    if let Some(name) = &payload.name {
        errors.required("name", name, NAME_MAX);
    }
    if let Some(slug) = &payload.slug {
        errors.slug("slug", slug.trim());
    }
    if let Some(price) = payload.price {
        errors.non_negative("price", price);
    }
    if let Some(stock) = payload.stock {
        errors.non_negative("stock", i64::from(stock));
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

async fn ensure_category(state: &AppState, category_id: Option<Uuid>) -> AppResult<()> {
    if let Some(id) = category_id {
        if Categories::find_by_id(id).one(&state.orm).await?.is_none() {
            let mut errors = FieldErrors::default();
            errors.add("category_id", "category does not exist");
            return Err(AppError::Validation(errors));
        }
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    rbac::require_permission(state, user, keys::PRODUCT_CREATE).await?;
    let slug = validate_create(&payload).map_err(AppError::Validation)?;
    ensure_category(state, payload.category_id).await?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        category_id: Set(payload.category_id),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        image_url: Set(payload.image_url),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active
        .insert(&state.orm)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_SLUG))?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("product_create", "products")
            .entity(product.id)
            .metadata(serde_json::json!({ "name": product.name, "price": product.price })),
    )
    .await;

    Ok(ApiResponse::ok("Product created", Product::from(product)))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    rbac::require_permission(state, user, keys::PRODUCT_UPDATE).await?;
    validate_update(&payload).map_err(AppError::Validation)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_category(state, payload.category_id).await?;

    let previous_price = existing.price;
    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active
        .update(&state.orm)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_SLUG))?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("product_update", "products")
            .entity(product.id)
            .metadata(serde_json::json!({
                "previous_price": previous_price,
                "price": product.price,
                "stock": product.stock,
            })),
    )
    .await;

    Ok(ApiResponse::ok("Updated", Product::from(product)))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    rbac::require_permission(state, user, keys::PRODUCT_DELETE).await?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("product_delete", "products").entity(id),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, slug: Option<&str>, price: i64, stock: i32) -> CreateProductRequest {
        CreateProductRequest {
            name: name.into(),
            slug: slug.map(Into::into),
            description: None,
            price,
            stock,
            category_id: None,
            image_url: None,
        }
    }

    #[test]
    fn slug_defaults_to_name() {
        let slug = validate_create(&request("Chicken Jerky Treats", None, 899, 12)).unwrap();
        assert_eq!(slug, "chicken-jerky-treats");
    }

    #[test]
    fn invalid_fields_are_reported_together() {
        let errors = validate_create(&request("", Some("Bad Slug"), -1, -5)).unwrap_err();
        assert!(errors.get("name").is_some());
        assert!(errors.get("slug").is_some());
        assert!(errors.get("price").is_some());
        assert!(errors.get("stock").is_some());
    }

    #[test]
    fn partial_update_checks_only_present_fields() {
        assert!(validate_update(&UpdateProductRequest::default()).is_ok());
        let payload = UpdateProductRequest {
            price: Some(-10),
            ..UpdateProductRequest::default()
        };
        let errors = validate_update(&payload).unwrap_err();
        assert_eq!(errors.get("price"), Some("must not be negative"));
    }
}
