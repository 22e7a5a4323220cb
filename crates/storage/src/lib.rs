//! Object-storage publishing for generated artifacts.
//!
//! The pipeline talks to storage through two seams: a [`StoreConnector`]
//! turns a [`StorageTarget`] (endpoint, bucket, credentials) into an
//! [`ObjectStore`], and the store uploads one file at a time, returning the
//! URL the artifact is reachable at. [`s3`] provides the S3-compatible
//! implementation.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod s3;

/// Region used when a target does not name one. S3-compatible services
/// (R2, MinIO) accept any value here.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default lifetime of presigned download URLs (7 days, the SigV4 maximum).
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The local file could not be opened or streamed.
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    /// The storage service rejected or failed the upload.
    #[error("failed to upload {key}: {reason}")]
    Upload { key: String, reason: String },

    /// A presigned download URL could not be produced.
    #[error("failed to presign {key}: {reason}")]
    Presign { key: String, reason: String },

    /// The artifact path has no usable file name.
    #[error("invalid object key for {0}")]
    InvalidKey(String),
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Access key pair for one bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// How the URL returned for an uploaded object is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStyle {
    /// `{endpoint}/{bucket}/{key}`.
    PathStyle,
    /// A presigned `GetObject` URL valid for the given duration.
    Presigned { expires_in: Duration },
}

/// Everything needed to reach one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageTarget {
    pub endpoint_url: String,
    pub bucket: String,
    pub region: Option<String>,
    pub credentials: StorageCredentials,
    pub url_style: UrlStyle,
}

impl StorageTarget {
    /// The endpoint without trailing slashes.
    pub fn endpoint(&self) -> &str {
        self.endpoint_url.trim_end_matches('/')
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// A bucket artifacts can be uploaded to.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key`, returning its URL.
    async fn upload_file(&self, path: &Path, key: &str) -> Result<String, StorageError>;
}

/// Opens an [`ObjectStore`] for a target.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, target: &StorageTarget) -> Arc<dyn ObjectStore>;
}

// ---------------------------------------------------------------------------
// Naming helpers
// ---------------------------------------------------------------------------

/// Object key for an artifact: `{job_id}/{file_name}`.
pub fn object_key(job_id: &str, path: &Path) -> Result<String, StorageError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
    Ok(format!("{job_id}/{file_name}"))
}

/// Path-style URL of an object.
pub fn path_style_url(endpoint_url: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint_url.trim_end_matches('/'))
}

/// Best-effort content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
