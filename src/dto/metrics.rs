use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::metrics::Granularity;

#[derive(Debug, Deserialize, IntoParams)]
pub struct MetricsQuery {
    /// Inclusive start date (UTC), default 29 days before `to`.
    pub from: Option<NaiveDate>,
    /// Inclusive end date (UTC), default today.
    pub to: Option<NaiveDate>,
    pub granularity: Option<Granularity>,
    /// Number of top products, default 10.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExportView {
    Series,
    Products,
    Categories,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub granularity: Option<Granularity>,
    pub limit: Option<usize>,
    pub format: Option<ExportFormat>,
    pub view: Option<ExportView>,
}
