use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    dto::catalog::{CreateCategoryRequest, UpdateCategoryRequest},
    entity::categories::{ActiveModel, Entity as Categories},
    error::{AppError, AppResult, map_unique_violation},
    middleware::auth::AuthUser,
    models::Category,
    rbac::{self, keys},
    response::ApiResponse,
    state::AppState,
    validation::{FieldErrors, slugify},
};

const NAME_MAX: usize = 120;
const DUPLICATE_SLUG: &str = "A category with this slug already exists";

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    rbac::require_permission(state, user, keys::CATEGORY_CREATE).await?;

    let slug = payload
        .slug
        .as_deref()
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| slugify(&payload.name));
    let mut errors = FieldErrors::default();
    errors.required("name", &payload.name, NAME_MAX);
    errors.slug("slug", &slug);
    errors.finish()?;

    let category = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        slug: Set(slug),
        description: Set(payload.description),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| map_unique_violation(e, DUPLICATE_SLUG))?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("category_create", "categories")
            .entity(category.id)
            .metadata(serde_json::json!({ "slug": category.slug })),
    )
    .await;

    Ok(ApiResponse::ok("Category created", Category::from(category)))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    rbac::require_permission(state, user, keys::CATEGORY_UPDATE).await?;

    let mut errors = FieldErrors::default();
    if let Some(name) = &payload.name {
        errors.required("name", name, NAME_MAX);
    }
    if let Some(slug) = &payload.slug {
        errors.slug("slug", slug.trim());
    }
    errors.finish()?;

    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

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
    active.updated_at = Set(Utc::now().into());

    let category = active
        .update(&state.orm)
        .await
        .map_err(|e| map_unique_violation(e, DUPLICATE_SLUG))?;

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("category_update", "categories").entity(category.id),
    )
    .await;

    Ok(ApiResponse::ok("Updated", Category::from(category)))
}

/// Products in the category stay and become uncategorized.
pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    rbac::require_permission(state, user, keys::CATEGORY_DELETE).await?;
    let result = Categories::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("category_delete", "categories").entity(id),
    )
    .await;

    Ok(ApiResponse::ok("Deleted", serde_json::json!({})))
}
