use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
};

use crate::{
    dto::uploads::UploadResponse,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::upload_service,
    state::AppState,
};

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(max_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/uploads",
        post(upload_image).layer(DefaultBodyLimit::max(max_bytes + MULTIPART_OVERHEAD)),
    )
}

#[utoipa::path(
    post,
    path = "/api/admin/uploads",
    request_body(content_type = "multipart/form-data", description = "Image in the `file` field"),
    responses(
        (status = 201, description = "Image stored", body = ApiResponse<UploadResponse>),
        (status = 400, description = "FILE_TOO_LARGE, INVALID_MIME, INVALID_EXTENSION or MISSING_FILE"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = []), ("session_cookie" = [])),
    tag = "Admin"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<UploadResponse>>)> {
    let resp = upload_service::upload_image(&state, &user, multipart).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}
