//! Sales aggregation for the admin dashboard.
//!
//! Everything here works on plain [`OrderFact`] values so the bucketing and
//! ranking rules are independent of how orders are loaded.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const DEFAULT_RANGE_DAYS: u64 = 30;
pub const MAX_RANGE_DAYS: i64 = 366 * 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

/// Inclusive range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> AppResult<Self> {
        if from > to {
            return Err(AppError::BadRequest("from must not be after to".into()));
        }
        let range = Self { from, to };
        if range.days() > MAX_RANGE_DAYS {
            return Err(AppError::BadRequest(format!(
                "range must not exceed {MAX_RANGE_DAYS} days"
            )));
        }
        // The comparison window and the exclusive end must stay representable.
        let fits = from.checked_sub_days(Days::new(range.days() as u64)).is_some()
            && to.checked_add_days(Days::new(1)).is_some();
        if !fits {
            return Err(AppError::BadRequest("date out of range".into()));
        }
        Ok(range)
    }

    /// Resolves optional query bounds; defaults to the last 30 days ending `today`.
    pub fn resolve(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        today: NaiveDate,
    ) -> AppResult<Self> {
        let to = to.unwrap_or(today);
        let from = match from {
            Some(from) => from,
            None => to
                .checked_sub_days(Days::new(DEFAULT_RANGE_DAYS - 1))
                .ok_or_else(|| AppError::BadRequest("invalid range".into()))?,
        };
        Self::new(from, to)
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Equal-length window ending the day before `from`.
    pub fn previous(&self) -> DateRange {
        let len = self.days() as u64;
        let to = self.from.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN);
        let from = to.checked_sub_days(Days::new(len - 1)).unwrap_or(NaiveDate::MIN);
        DateRange { from, to }
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.from.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the range.
    pub fn end_exclusive_utc(&self) -> DateTime<Utc> {
        self.to
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX)
            .and_time(NaiveTime::MIN)
            .and_utc()
    }

    pub fn each_day(&self) -> impl Iterator<Item = NaiveDate> {
        let from = self.from;
        (0..self.days() as u64).map(move |offset| from + Days::new(offset))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemFact {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_slug: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub quantity: i64,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderFact {
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub total: i64,
    pub items: Vec<ItemFact>,
}

impl OrderFact {
    pub fn units(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => {
            date - Days::new(u64::from(date.weekday().num_days_from_monday()))
        }
        Granularity::Month => date.with_day(1).unwrap_or(date),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct Summary {
    pub revenue: i64,
    pub orders: i64,
    pub units: i64,
    /// Revenue per order, 0 when there are no orders.
    pub average_order_value: i64,
    pub customers: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Deltas {
    /// Percentage change; `null` when the previous value is 0.
    pub revenue: Option<f64>,
    pub orders: Option<f64>,
    pub units: Option<f64>,
    pub average_order_value: Option<f64>,
    pub customers: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
pub struct SeriesPoint {
    pub bucket: NaiveDate,
    pub revenue: i64,
    pub orders: i64,
    pub units: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub units: i64,
    pub revenue: i64,
    pub orders: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryShare {
    pub category_id: Option<Uuid>,
    pub name: String,
    pub units: i64,
    pub revenue: i64,
    /// Fraction of item revenue in range, 0.0..=1.0.
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Dashboard {
    pub range: DateRange,
    pub previous_range: DateRange,
    pub granularity: Granularity,
    pub summary: Summary,
    pub previous_summary: Summary,
    pub deltas: Deltas,
    pub series: Vec<SeriesPoint>,
    pub top_products: Vec<TopProduct>,
    pub categories: Vec<CategoryShare>,
}

pub fn summarize(orders: &[OrderFact]) -> Summary {
    let revenue: i64 = orders.iter().map(|o| o.total).sum();
    let count = orders.len() as i64;
    let units = orders.iter().map(OrderFact::units).sum();
    let customers = orders
        .iter()
        .filter_map(|o| o.user_id)
        .collect::<HashSet<_>>()
        .len() as i64;

    Summary {
        revenue,
        orders: count,
        units,
        average_order_value: if count == 0 { 0 } else { revenue / count },
        customers,
    }
}

pub fn percent_change(current: i64, previous: i64) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    let change = (current - previous) as f64 / previous as f64 * 100.0;
    Some((change * 100.0).round() / 100.0)
}

pub fn deltas(current: &Summary, previous: &Summary) -> Deltas {
    Deltas {
        revenue: percent_change(current.revenue, previous.revenue),
        orders: percent_change(current.orders, previous.orders),
        units: percent_change(current.units, previous.units),
        average_order_value: percent_change(
            current.average_order_value,
            previous.average_order_value,
        ),
        customers: percent_change(current.customers, previous.customers),
    }
}

/// Buckets orders by day, ISO week start or month start. Only day
/// granularity is zero-filled; the other two list buckets that saw orders.
pub fn time_series(
    orders: &[OrderFact],
    range: &DateRange,
    granularity: Granularity,
) -> Vec<SeriesPoint> {
    let mut buckets: BTreeMap<NaiveDate, SeriesPoint> = BTreeMap::new();

    if granularity == Granularity::Day {
        for day in range.each_day() {
            buckets.insert(
                day,
                SeriesPoint {
                    bucket: day,
                    ..SeriesPoint::default()
                },
            );
        }
    }

    for order in orders {
        let date = order.created_at.date_naive();
        if !range.contains(date) {
            continue;
        }
        let key = bucket_start(date, granularity);
        let point = buckets.entry(key).or_insert_with(|| SeriesPoint {
            bucket: key,
            ..SeriesPoint::default()
        });
        point.revenue += order.total;
        point.orders += 1;
        point.units += order.units();
    }

    buckets.into_values().collect()
}

pub fn top_products(orders: &[OrderFact], limit: usize) -> Vec<TopProduct> {
    let mut by_product: HashMap<String, TopProduct> = HashMap::new();

    for order in orders {
        let mut seen: HashSet<String> = HashSet::new();
        for item in &order.items {
            // Deleted products keep their slug snapshot as identity.
            let key = match item.product_id {
                Some(id) => id.to_string(),
                None => format!("slug:{}", item.product_slug),
            };
            let entry = by_product.entry(key.clone()).or_insert_with(|| TopProduct {
                product_id: item.product_id,
                name: item.product_name.clone(),
                slug: item.product_slug.clone(),
                units: 0,
                revenue: 0,
                orders: 0,
            });
            entry.units += item.quantity;
            entry.revenue += item.revenue;
            if seen.insert(key) {
                entry.orders += 1;
            }
        }
    }

    let mut ranked: Vec<TopProduct> = by_product.into_values().collect();
    ranked.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then(b.units.cmp(&a.units))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    ranked
}

pub fn category_distribution(orders: &[OrderFact]) -> Vec<CategoryShare> {
    let mut by_category: HashMap<Option<Uuid>, CategoryShare> = HashMap::new();

    for item in orders.iter().flat_map(|o| o.items.iter()) {
        let entry = by_category
            .entry(item.category_id)
            .or_insert_with(|| CategoryShare {
                category_id: item.category_id,
                name: item
                    .category_name
                    .clone()
                    .unwrap_or_else(|| "Uncategorized".to_string()),
                units: 0,
                revenue: 0,
                share: 0.0,
            });
        entry.units += item.quantity;
        entry.revenue += item.revenue;
    }

    let total: i64 = by_category.values().map(|c| c.revenue).sum();
    let mut shares: Vec<CategoryShare> = by_category
        .into_values()
        .map(|mut c| {
            c.share = if total == 0 {
                0.0
            } else {
                c.revenue as f64 / total as f64
            };
            c
        })
        .collect();
    shares.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    shares
}

pub fn build_dashboard(
    range: DateRange,
    granularity: Granularity,
    current: &[OrderFact],
    previous: &[OrderFact],
    limit: usize,
) -> Dashboard {
    let summary = summarize(current);
    let previous_summary = summarize(previous);
    Dashboard {
        range,
        previous_range: range.previous(),
        granularity,
        deltas: deltas(&summary, &previous_summary),
        summary,
        previous_summary,
        series: time_series(current, &range, granularity),
        top_products: top_products(current, limit),
        categories: category_distribution(current),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_document<I>(header: &str, rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out = String::from(header);
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

pub fn series_csv(series: &[SeriesPoint]) -> String {
    csv_document(
        "bucket,revenue,orders,units",
        series.iter().map(|p| {
            vec![
                p.bucket.to_string(),
                p.revenue.to_string(),
                p.orders.to_string(),
                p.units.to_string(),
            ]
        }),
    )
}

pub fn products_csv(products: &[TopProduct]) -> String {
    csv_document(
        "product_id,name,slug,units,revenue,orders",
        products.iter().map(|p| {
            vec![
                p.product_id.map(|id| id.to_string()).unwrap_or_default(),
                p.name.clone(),
                p.slug.clone(),
                p.units.to_string(),
                p.revenue.to_string(),
                p.orders.to_string(),
            ]
        }),
    )
}

pub fn categories_csv(categories: &[CategoryShare]) -> String {
    csv_document(
        "category_id,name,units,revenue,share",
        categories.iter().map(|c| {
            vec![
                c.category_id.map(|id| id.to_string()).unwrap_or_default(),
                c.name.clone(),
                c.units.to_string(),
                c.revenue.to_string(),
                format!("{:.4}", c.share),
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn item(product: Uuid, name: &str, category: Option<(Uuid, &str)>, qty: i64, price: i64) -> ItemFact {
        ItemFact {
            product_id: Some(product),
            product_name: name.to_string(),
            product_slug: name.to_lowercase().replace(' ', "-"),
            category_id: category.map(|c| c.0),
            category_name: category.map(|c| c.1.to_string()),
            quantity: qty,
            revenue: qty * price,
        }
    }

    fn order(created_at: DateTime<Utc>, user: Option<Uuid>, items: Vec<ItemFact>) -> OrderFact {
        OrderFact {
            order_id: Uuid::new_v4(),
            user_id: user,
            created_at,
            total: items.iter().map(|i| i.revenue).sum(),
            items,
        }
    }

    #[test]
    fn empty_day_range_is_zero_filled_inclusive() {
        let range = DateRange::new(date(2024, 2, 26), date(2024, 3, 4)).unwrap();
        let series = time_series(&[], &range, Granularity::Day);

        assert_eq!(range.days(), 8);
        assert_eq!(series.len(), 8);
        assert_eq!(series.first().unwrap().bucket, date(2024, 2, 26));
        assert_eq!(series.last().unwrap().bucket, date(2024, 3, 4));
        assert!(series.iter().all(|p| p.revenue == 0 && p.orders == 0 && p.units == 0));
        // Leap day is present.
        assert!(series.iter().any(|p| p.bucket == date(2024, 2, 29)));
    }

    #[test]
    fn single_day_range_has_one_point() {
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 1)).unwrap();
        assert_eq!(time_series(&[], &range, Granularity::Day).len(), 1);
    }

    #[test]
    fn day_buckets_accumulate() {
        let p = Uuid::new_v4();
        let range = DateRange::new(date(2024, 5, 1), date(2024, 5, 3)).unwrap();
        let orders = vec![
            order(at(2024, 5, 2, 9), None, vec![item(p, "Bone", None, 2, 300)]),
            order(at(2024, 5, 2, 23), None, vec![item(p, "Bone", None, 1, 300)]),
            // Outside the range; ignored.
            order(at(2024, 5, 4, 0), None, vec![item(p, "Bone", None, 9, 300)]),
        ];
        let series = time_series(&orders, &range, Granularity::Day);
        assert_eq!(series.len(), 3);
        assert_eq!(series[1].bucket, date(2024, 5, 2));
        assert_eq!(series[1].revenue, 900);
        assert_eq!(series[1].orders, 2);
        assert_eq!(series[1].units, 3);
        assert_eq!(series[0].orders, 0);
    }

    #[test]
    fn week_buckets_start_on_monday_and_skip_empty_weeks() {
        let p = Uuid::new_v4();
        let range = DateRange::new(date(2024, 4, 1), date(2024, 4, 30)).unwrap();
        let orders = vec![
            // Wednesday and Sunday of the same ISO week.
            order(at(2024, 4, 3, 12), None, vec![item(p, "Leash", None, 1, 1500)]),
            order(at(2024, 4, 7, 12), None, vec![item(p, "Leash", None, 1, 1500)]),
            order(at(2024, 4, 22, 12), None, vec![item(p, "Leash", None, 2, 1500)]),
        ];
        let series = time_series(&orders, &range, Granularity::Week);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].bucket, date(2024, 4, 1));
        assert_eq!(series[0].orders, 2);
        assert_eq!(series[1].bucket, date(2024, 4, 22));
        assert_eq!(series[1].units, 2);
    }

    #[test]
    fn month_buckets_start_on_the_first() {
        assert_eq!(bucket_start(date(2024, 3, 31), Granularity::Month), date(2024, 3, 1));
        assert_eq!(bucket_start(date(2024, 1, 1), Granularity::Week), date(2024, 1, 1));
        assert_eq!(bucket_start(date(2023, 1, 1), Granularity::Week), date(2022, 12, 26));

        let p = Uuid::new_v4();
        let range = DateRange::new(date(2024, 1, 15), date(2024, 3, 15)).unwrap();
        let orders = vec![
            order(at(2024, 1, 20, 1), None, vec![item(p, "Bed", None, 1, 5000)]),
            order(at(2024, 3, 2, 1), None, vec![item(p, "Bed", None, 1, 5000)]),
        ];
        let buckets: Vec<NaiveDate> = time_series(&orders, &range, Granularity::Month)
            .into_iter()
            .map(|p| p.bucket)
            .collect();
        assert_eq!(buckets, vec![date(2024, 1, 1), date(2024, 3, 1)]);
    }

    #[test]
    fn previous_range_has_equal_length_and_abuts() {
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 10)).unwrap();
        let prev = range.previous();
        assert_eq!(prev.to, date(2024, 2, 29));
        assert_eq!(prev.from, date(2024, 2, 20));
        assert_eq!(prev.days(), range.days());
    }

    #[test]
    fn dates_at_the_calendar_edges_are_rejected() {
        let err = DateRange::new(NaiveDate::MIN, NaiveDate::MIN).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = DateRange::resolve(Some(NaiveDate::MAX), Some(NaiveDate::MAX), date(2024, 1, 1))
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(DateRange::resolve(None, Some(NaiveDate::MIN), date(2024, 1, 1)).is_err());

        let far_past = NaiveDate::MIN + Days::new(10);
        let range = DateRange::new(far_past, far_past).unwrap();
        assert_eq!(range.previous().days(), 1);
        assert!(range.end_exclusive_utc() > range.start_utc());
    }

    #[test]
    fn resolve_defaults_to_last_thirty_days() {
        let today = date(2024, 6, 30);
        let range = DateRange::resolve(None, None, today).unwrap();
        assert_eq!(range.to, today);
        assert_eq!(range.days(), 30);
        assert!(DateRange::resolve(Some(date(2024, 7, 1)), Some(today), today).is_err());
    }

    #[test]
    fn summary_and_deltas() {
        let p = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let current = vec![
            order(at(2024, 5, 1, 1), Some(alice), vec![item(p, "Treats", None, 2, 500)]),
            order(at(2024, 5, 2, 1), Some(alice), vec![item(p, "Treats", None, 4, 500)]),
        ];
        let previous = vec![order(at(2024, 4, 1, 1), None, vec![item(p, "Treats", None, 2, 500)])];

        let summary = summarize(&current);
        assert_eq!(summary.revenue, 3000);
        assert_eq!(summary.orders, 2);
        assert_eq!(summary.units, 6);
        assert_eq!(summary.average_order_value, 1500);
        assert_eq!(summary.customers, 1);

        let d = deltas(&summary, &summarize(&previous));
        assert_eq!(d.revenue, Some(200.0));
        assert_eq!(d.orders, Some(100.0));
        assert_eq!(d.customers, None);
        assert_eq!(summarize(&[]).average_order_value, 0);
    }

    #[test]
    fn top_products_sorted_by_revenue() {
        let food = Uuid::new_v4();
        let toy = Uuid::new_v4();
        let orders = vec![
            order(
                at(2024, 5, 1, 1),
                None,
                vec![item(food, "Food", None, 1, 4000), item(toy, "Toy", None, 10, 100)],
            ),
            order(at(2024, 5, 2, 1), None, vec![item(toy, "Toy", None, 5, 100)]),
        ];
        let ranked = top_products(&orders, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].product_id, Some(food));
        assert_eq!(ranked[1].revenue, 1500);
        assert_eq!(ranked[1].orders, 2);
        assert_eq!(top_products(&orders, 1).len(), 1);
    }

    #[test]
    fn deleted_products_rank_by_slug() {
        let mut gone = item(Uuid::new_v4(), "Old Collar", None, 3, 700);
        gone.product_id = None;
        let orders = vec![order(at(2024, 5, 1, 1), None, vec![gone.clone(), gone])];
        let ranked = top_products(&orders, 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].units, 6);
        assert_eq!(ranked[0].orders, 1);
    }

    #[test]
    fn category_shares_sum_to_one() {
        let dogs = (Uuid::new_v4(), "Dogs");
        let cats = (Uuid::new_v4(), "Cats");
        let orders = vec![order(
            at(2024, 5, 1, 1),
            None,
            vec![
                item(Uuid::new_v4(), "Kibble", Some(dogs), 3, 1000),
                item(Uuid::new_v4(), "Scratcher", Some(cats), 1, 1000),
                item(Uuid::new_v4(), "Gift Card", None, 1, 0),
            ],
        )];
        let shares = category_distribution(&orders);
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].name, "Dogs");
        assert!((shares[0].share - 0.75).abs() < f64::EPSILON);
        let total: f64 = shares.iter().map(|s| s.share).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(shares.iter().any(|s| s.category_id.is_none() && s.name == "Uncategorized"));
    }

    #[test]
    fn csv_escapes_fields() {
        let products = vec![TopProduct {
            product_id: None,
            name: "Toy, \"squeaky\"".into(),
            slug: "toy".into(),
            units: 1,
            revenue: 250,
            orders: 1,
        }];
        let csv = products_csv(&products);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("product_id,name,slug,units,revenue,orders"));
        assert_eq!(lines.next(), Some(",\"Toy, \"\"squeaky\"\"\",toy,1,250,1"));
    }

    #[test]
    fn series_csv_has_row_per_point() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        let csv = series_csv(&time_series(&[], &range, Granularity::Day));
        assert_eq!(csv.lines().count(), 4);
        assert!(csv.contains("2024-01-02,0,0,0"));
    }
}
