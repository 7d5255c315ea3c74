//! Product image uploads stored on the local filesystem.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
pub const PUBLIC_PREFIX: &str = "/uploads";

const HASH_PREFIX_LEN: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum UploadError {
    #[error("file exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },
    #[error("unsupported content type {0}")]
    InvalidMime(String),
    #[error("unsupported file extension {0}")]
    InvalidExtension(String),
    #[error("no file was uploaded")]
    MissingFile,
}

impl UploadError {
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::TooLarge { .. } => "FILE_TOO_LARGE",
            UploadError::InvalidMime(_) => "INVALID_MIME",
            UploadError::InvalidExtension(_) => "INVALID_EXTENSION",
            UploadError::MissingFile => "MISSING_FILE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedImage {
    pub extension: String,
    pub content_type: String,
}

/// Lowercased extension of the client file name; `jpeg` is kept as sent.
fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

pub fn validate(
    file_name: &str,
    content_type: Option<&str>,
    size: usize,
    max_bytes: usize,
) -> Result<ValidatedImage, UploadError> {
    if size == 0 {
        return Err(UploadError::MissingFile);
    }
    if size > max_bytes {
        return Err(UploadError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_MIME_TYPES.contains(&content_type.as_str()) {
        return Err(UploadError::InvalidMime(content_type));
    }

    let extension = extension_of(file_name).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadError::InvalidExtension(extension));
    }

    Ok(ValidatedImage {
        extension,
        content_type,
    })
}

/// `<first 16 hex chars of sha256(content)>.<ext>`; identical bytes share a name.
pub fn stored_file_name(bytes: &[u8], extension: &str) -> String {
    let hex = format!("{:x}", Sha256::digest(bytes));
    format!("{}.{extension}", &hex[..HASH_PREFIX_LEN])
}

pub async fn persist(dir: &Path, file_name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    if fs::try_exists(&path).await? {
        return Ok(path);
    }
    fs::write(&path, bytes).await?;
    Ok(path)
}

pub fn public_url(file_name: &str) -> String {
    format!("{PUBLIC_PREFIX}/{file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    #[test]
    fn accepts_supported_images() {
        let image = validate("Dog Bed.PNG", Some("image/png"), 10, MAX).unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(image.content_type, "image/png");
        assert!(validate("x.jpeg", Some("image/jpeg; charset=binary"), 1, MAX).is_ok());
    }

    #[test]
    fn classifies_failures() {
        assert_eq!(
            validate("big.png", Some("image/png"), MAX + 1, MAX),
            Err(UploadError::TooLarge {
                size: MAX + 1,
                max: MAX
            })
        );
        assert_eq!(
            validate("doc.png", Some("application/pdf"), 5, MAX),
            Err(UploadError::InvalidMime("application/pdf".into()))
        );
        assert_eq!(
            validate("photo.exe", Some("image/png"), 5, MAX),
            Err(UploadError::InvalidExtension("exe".into()))
        );
        assert_eq!(
            validate("noext", Some("image/png"), 5, MAX),
            Err(UploadError::InvalidExtension(String::new()))
        );
        assert_eq!(validate("a.png", Some("image/png"), 0, MAX), Err(UploadError::MissingFile));
        assert_eq!(
            validate("a.png", None, 5, MAX).map_err(|e| e.code()),
            Err("INVALID_MIME")
        );
    }

    #[test]
    fn file_names_follow_content() {
        let a = stored_file_name(b"kibble", "png");
        let b = stored_file_name(b"kibble", "png");
        let c = stored_file_name(b"catnip", "png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), HASH_PREFIX_LEN + ".png".len());
        assert!(a.ends_with(".png"));
        assert_eq!(stored_file_name(b"", "png"), "e3b0c44298fc1c14.png");
    }

    #[tokio::test]
    async fn persist_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let name = stored_file_name(b"bytes", "gif");
        let path = persist(dir.path(), &name, b"bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");

        let again = persist(dir.path(), &name, b"bytes").await.unwrap();
        assert_eq!(path, again);
        assert_eq!(public_url(&name), format!("/uploads/{name}"));
    }
}
