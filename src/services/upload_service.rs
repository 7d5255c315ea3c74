use axum::{
    extract::{Multipart, multipart::MultipartError},
    http::StatusCode,
};

use crate::{
    audit::{self, AuditEntry},
    dto::uploads::UploadResponse,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    rbac::{self, keys},
    response::ApiResponse,
    state::AppState,
    uploads::{self, UploadError},
};

const FILE_FIELD: &str = "file";

struct IncomingFile {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

fn multipart_error(err: MultipartError, read: usize, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadError::TooLarge {
            size: read.max(max_bytes + 1),
            max: max_bytes,
        }
        .into();
    }
    AppError::BadRequest(err.body_text())
}

/// Reads the `file` part; other parts are drained and ignored. Stops as soon
/// as the file grows past `max_bytes`.
async fn read_file_field(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> AppResult<Option<IncomingFile>> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, 0, max_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, bytes.len(), max_bytes))?
        {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > max_bytes {
                return Err(UploadError::TooLarge {
                    size: bytes.len(),
                    max: max_bytes,
                }
                .into());
            }
        }
        return Ok(Some(IncomingFile {
            file_name,
            content_type,
            bytes,
        }));
    }
    Ok(None)
}

pub async fn upload_image(
    state: &AppState,
    user: &AuthUser,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<UploadResponse>> {
    rbac::require_permission(state, user, keys::UPLOAD_CREATE).await?;

    let max_bytes = state.config.upload_max_bytes;
    let file = read_file_field(&mut multipart, max_bytes)
        .await?
        .ok_or(UploadError::MissingFile)?;
    let image = uploads::validate(
        &file.file_name,
        file.content_type.as_deref(),
        file.bytes.len(),
        max_bytes,
    )?;

    let stored = uploads::stored_file_name(&file.bytes, &image.extension);
    uploads::persist(&state.config.upload_dir, &stored, &file.bytes)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("writing upload")))?;

    tracing::info!(file = %stored, size = file.bytes.len(), "image stored");

    audit::record(
        state,
        Some(user.user_id),
        AuditEntry::new("upload_create", "uploads")
            .entity(&stored)
            .metadata(serde_json::json!({
                "original_name": file.file_name,
                "size": file.bytes.len(),
                "content_type": image.content_type,
            })),
    )
    .await;

    Ok(ApiResponse::ok(
        "Uploaded",
        UploadResponse {
            url: uploads::public_url(&stored),
            filename: stored,
            size: file.bytes.len(),
            content_type: image.content_type,
        },
    ))
}
