use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::{
    dto::metrics::{ExportFormat, ExportQuery, ExportView, MetricsQuery},
    entity::{
        categories::Entity as Categories,
        order_items::Entity as OrderItems,
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    metrics::{self, Dashboard, DateRange, Granularity, ItemFact, OrderFact},
    middleware::auth::AuthUser,
    rbac::{self, keys},
    response::ApiResponse,
    services::order_service::STATUS_CANCELLED,
    state::AppState,
};

pub const DEFAULT_TOP_PRODUCTS: usize = 10;
pub const MAX_TOP_PRODUCTS: usize = 100;

/// A rendered export ready to be sent as an attachment.
#[derive(Debug)]
pub struct Export {
    pub content_type: &'static str,
    pub file_name: String,
    pub body: String,
}

fn top_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_TOP_PRODUCTS)
        .clamp(1, MAX_TOP_PRODUCTS)
}

/// Non-cancelled orders created inside `range`, with their items and the
/// current category of each product that still exists.
async fn load_facts(state: &AppState, range: &DateRange) -> AppResult<Vec<OrderFact>> {
    let rows = Orders::find()
        .filter(OrderCol::CreatedAt.gte(range.start_utc()))
        .filter(OrderCol::CreatedAt.lt(range.end_exclusive_utc()))
        .filter(OrderCol::Status.ne(STATUS_CANCELLED))
        .order_by_asc(OrderCol::CreatedAt)
        .find_with_related(OrderItems)
        .all(&state.orm)
        .await?;

    let mut product_ids: Vec<Uuid> = rows
        .iter()
        .flat_map(|(_, items)| items.iter().filter_map(|i| i.product_id))
        .collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    let mut categories: HashMap<Uuid, (Uuid, String)> = HashMap::new();
    if !product_ids.is_empty() {
        let products = Products::find()
            .filter(ProdCol::Id.is_in(product_ids))
            .find_also_related(Categories)
            .all(&state.orm)
            .await?;
        for (product, category) in products {
            if let Some(category) = category {
                categories.insert(product.id, (category.id, category.name));
            }
        }
    }

    let facts = rows
        .into_iter()
        .map(|(order, items)| OrderFact {
            order_id: order.id,
            user_id: order.user_id,
            created_at: order.created_at.with_timezone(&Utc),
            total: order.total,
            items: items
                .into_iter()
                .map(|item| {
                    let category = item.product_id.and_then(|id| categories.get(&id));
                    ItemFact {
                        product_id: item.product_id,
                        product_name: item.product_name,
                        product_slug: item.product_slug,
                        category_id: category.map(|(id, _)| *id),
                        category_name: category.map(|(_, name)| name.clone()),
                        quantity: i64::from(item.quantity),
                        revenue: item.line_total,
                    }
                })
                .collect(),
        })
        .collect();
    Ok(facts)
}

async fn dashboard(
    state: &AppState,
    range: DateRange,
    granularity: Granularity,
    limit: usize,
) -> AppResult<Dashboard> {
    let current = load_facts(state, &range).await?;
    let previous = load_facts(state, &range.previous()).await?;
    tracing::debug!(
        from = %range.from,
        to = %range.to,
        orders = current.len(),
        "metrics loaded"
    );
    Ok(metrics::build_dashboard(
        range,
        granularity,
        &current,
        &previous,
        limit,
    ))
}

pub async fn get_dashboard(
    state: &AppState,
    user: &AuthUser,
    query: MetricsQuery,
) -> AppResult<ApiResponse<Dashboard>> {
    rbac::require_permission(state, user, keys::METRICS_READ).await?;
    let range = DateRange::resolve(query.from, query.to, Utc::now().date_naive())?;
    let dashboard = dashboard(
        state,
        range,
        query.granularity.unwrap_or_default(),
        top_limit(query.limit),
    )
    .await?;
    Ok(ApiResponse::ok("Metrics", dashboard))
}

pub fn render_export(
    dashboard: &Dashboard,
    format: ExportFormat,
    view: ExportView,
) -> AppResult<Export> {
    let stem = match view {
        ExportView::Series => "series",
        ExportView::Products => "top-products",
        ExportView::Categories => "categories",
    };
    let file_name = format!(
        "metrics-{stem}-{}-{}.{}",
        dashboard.range.from,
        dashboard.range.to,
        match format {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    );

    let body = match format {
        ExportFormat::Csv => match view {
            ExportView::Series => metrics::series_csv(&dashboard.series),
            ExportView::Products => metrics::products_csv(&dashboard.top_products),
            ExportView::Categories => metrics::categories_csv(&dashboard.categories),
        },
        ExportFormat::Json => {
            let value = match view {
                ExportView::Series => serde_json::to_value(&dashboard.series),
                ExportView::Products => serde_json::to_value(&dashboard.top_products),
                ExportView::Categories => serde_json::to_value(&dashboard.categories),
            }
            .map_err(AppError::internal)?;
            serde_json::to_string_pretty(&value).map_err(AppError::internal)?
        }
    };

    Ok(Export {
        content_type: match format {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        },
        file_name,
        body,
    })
}

pub async fn export(state: &AppState, user: &AuthUser, query: ExportQuery) -> AppResult<Export> {
    rbac::require_permission(state, user, keys::METRICS_READ).await?;
    let range = DateRange::resolve(query.from, query.to, Utc::now().date_naive())?;
    let dashboard = dashboard(
        state,
        range,
        query.granularity.unwrap_or_default(),
        top_limit(query.limit),
    )
    .await?;
    render_export(
        &dashboard,
        query.format.unwrap_or(ExportFormat::Csv),
        query.view.unwrap_or(ExportView::Series),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    fn sample_dashboard() -> Dashboard {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        )
        .unwrap();
        let order = OrderFact {
            order_id: Uuid::new_v4(),
            user_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            total: 2500,
            items: vec![ItemFact {
                product_id: None,
                product_name: "Chew Rope".into(),
                product_slug: "chew-rope".into(),
                category_id: None,
                category_name: None,
                quantity: 1,
                revenue: 2500,
            }],
        };
        metrics::build_dashboard(range, Granularity::Day, &[order], &[], 10)
    }

    #[test]
    fn top_limit_is_clamped() {
        assert_eq!(top_limit(None), DEFAULT_TOP_PRODUCTS);
        assert_eq!(top_limit(Some(0)), 1);
        assert_eq!(top_limit(Some(5000)), MAX_TOP_PRODUCTS);
    }

    #[test]
    fn csv_export_names_the_range() {
        let export =
            render_export(&sample_dashboard(), ExportFormat::Csv, ExportView::Series).unwrap();
        assert_eq!(export.file_name, "metrics-series-2024-03-01-2024-03-02.csv");
        assert!(export.content_type.starts_with("text/csv"));
        let mut lines = export.body.lines();
        assert_eq!(lines.next(), Some("bucket,revenue,orders,units"));
        assert_eq!(lines.next(), Some("2024-03-01,2500,1,1"));
        assert_eq!(lines.next(), Some("2024-03-02,0,0,0"));
    }

    #[test]
    fn json_export_is_an_array() {
        let export =
            render_export(&sample_dashboard(), ExportFormat::Json, ExportView::Products).unwrap();
        let value: serde_json::Value = serde_json::from_str(&export.body).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["slug"], "chew-rope");
        assert_eq!(export.content_type, "application/json");
    }
}
