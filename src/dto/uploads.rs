use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: usize,
    pub content_type: String,
}
