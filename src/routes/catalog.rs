use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::catalog::{CategoryList, CategoryWithProducts, ProductList, SearchResults},
    error::AppResult,
    models::Product,
    response::ApiResponse,
    routes::params::{Pagination, ProductQuery, SearchQuery},
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{slug}", get(get_category))
        .route("/products", get(list_products))
        .route("/products/{key}", get(get_product))
        .route("/search", get(search))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "All categories by name", body = ApiResponse<CategoryList>)
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = catalog_service::list_categories(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/categories/{slug}",
    params(
        ("slug" = String, Path, description = "Category slug"),
        Pagination
    ),
    responses(
        (status = 200, description = "Category with its products", body = ApiResponse<CategoryWithProducts>),
        (status = 404, description = "Category not found")
    ),
    tag = "Catalog"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CategoryWithProducts>>> {
    let resp = catalog_service::get_category(&state, &slug, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductQuery),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = catalog_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{key}",
    params(
        ("key" = String, Path, description = "Product slug or ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = catalog_service::get_product(&state, &key).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching products and categories", body = ApiResponse<SearchResults>),
        (status = 422, description = "Empty query")
    ),
    tag = "Catalog"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<SearchResults>>> {
    let resp = catalog_service::search(&state, query).await?;
    Ok(Json(resp))
}
