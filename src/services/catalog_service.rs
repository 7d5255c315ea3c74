use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Select,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    dto::catalog::{CategoryList, CategoryWithProducts, ProductList, SearchResults},
    entity::{
        categories::{Column as CatCol, Entity as Categories},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    models::{Category, Product},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SearchQuery, SortOrder},
    state::AppState,
    validation::FieldErrors,
};

fn like_pattern(search: &str) -> String {
    let escaped = search
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn text_match(search: &str) -> Condition {
    let pattern = like_pattern(search);
    Condition::any()
        .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
        .add(Expr::col(ProdCol::Description).ilike(pattern))
}

async fn paginate_products(
    state: &AppState,
    finder: Select<Products>,
    pagination: Pagination,
) -> AppResult<(Vec<Product>, Meta)> {
    let (page, limit, offset) = pagination.normalize();
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();
    Ok((items, Meta::new(page, limit, total)))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.trim().is_empty()) {
        condition = condition.add(text_match(search));
    }

    if let Some(slug) = query.category.as_ref().filter(|s| !s.is_empty()) {
        let category = Categories::find()
            .filter(CatCol::Slug.eq(slug.clone()))
            .one(&state.orm)
            .await?;
        match category {
            Some(c) => condition = condition.add(ProdCol::CategoryId.eq(c.id)),
            None => {
                let (page, limit, _) = query.pagination().normalize();
                return Ok(ApiResponse::paged(
                    "Products",
                    ProductList { items: vec![] },
                    Meta::new(page, limit, 0),
                ));
            }
        }
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::Name => ProdCol::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };
    finder = finder.order_by_asc(ProdCol::Id);

    let (items, meta) = paginate_products(state, finder, query.pagination()).await?;
    Ok(ApiResponse::paged("Products", ProductList { items }, meta))
}

/// Looks a product up by slug, or by id when the key parses as a UUID.
pub async fn get_product(state: &AppState, key: &str) -> AppResult<ApiResponse<Product>> {
    let finder = match Uuid::parse_str(key) {
        Ok(id) => Products::find_by_id(id),
        Err(_) => Products::find().filter(ProdCol::Slug.eq(key)),
    };
    let product = finder
        .one(&state.orm)
        .await?
        .map(Product::from)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("Product", product))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(CatCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    Ok(ApiResponse::ok("Categories", CategoryList { items }))
}

pub async fn get_category(
    state: &AppState,
    slug: &str,
    pagination: Pagination,
) -> AppResult<ApiResponse<CategoryWithProducts>> {
    let category = Categories::find()
        .filter(CatCol::Slug.eq(slug))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let finder = Products::find()
        .filter(ProdCol::CategoryId.eq(category.id))
        .order_by_asc(ProdCol::Name);
    let (products, meta) = paginate_products(state, finder, pagination).await?;

    Ok(ApiResponse::paged(
        "Category",
        CategoryWithProducts {
            category: Category::from(category),
            products,
        },
        meta,
    ))
}

pub async fn search(state: &AppState, query: SearchQuery) -> AppResult<ApiResponse<SearchResults>> {
    let term = query.q.trim().to_string();
    let mut errors = FieldErrors::default();
    errors.required("q", &term, 100);
    errors.finish()?;

    let finder = Products::find()
        .filter(text_match(&term))
        .order_by_asc(ProdCol::Name);
    let (products, meta) =
        paginate_products(state, finder, Pagination::new(query.page, query.per_page)).await?;

    let categories = Categories::find()
        .filter(Expr::col(CatCol::Name).ilike(like_pattern(&term)))
        .order_by_asc(CatCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

    Ok(ApiResponse::paged(
        "Search results",
        SearchResults {
            query: term,
            products,
            categories,
        },
        meta,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_pattern(" cat "), "%cat%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }
}
