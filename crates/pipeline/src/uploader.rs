//! Input asset upload.
//!
//! Both batches are aggregate-tolerant: every item is attempted, failures
//! are collected per item, and the batch reports `Error` if any item
//! failed. The runner aborts the job on an `Error` batch.

use base64::prelude::*;
use genjob_comfyui::api::{EngineApi, IMAGE_CONTENT_TYPE};
use genjob_core::job::{FileUrlInput, ImageInput};

/// Overall status of an upload batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Error,
}

/// Per-item outcome of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub status: UploadStatus,
    pub success_messages: Vec<String>,
    pub error_messages: Vec<String>,
}

impl UploadReport {
    fn from_messages(success_messages: Vec<String>, error_messages: Vec<String>) -> Self {
        let status = if error_messages.is_empty() {
            UploadStatus::Success
        } else {
            UploadStatus::Error
        };
        Self {
            status,
            success_messages,
            error_messages,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == UploadStatus::Error
    }
}

/// Strip an optional `data:<mime>;base64,` prefix and decode.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match encoded.strip_prefix("data:") {
        Some(uri) => uri.split_once(',').map_or(uri, |(_, data)| data),
        None => encoded,
    };
    BASE64_STANDARD.decode(payload.trim())
}

/// Decode and upload each inline image.
pub async fn upload_images(api: &dyn EngineApi, images: &[ImageInput]) -> UploadReport {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    if images.is_empty() {
        return UploadReport::from_messages(successes, errors);
    }

    tracing::info!(count = images.len(), "Uploading input images");

    for image in images {
        let bytes = match decode_image(&image.image) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(name = %image.name, error = %e, "Invalid base64 image");
                errors.push(format!("Error decoding {}: {e}", image.name));
                continue;
            }
        };

        match api.upload_image(&image.name, bytes, IMAGE_CONTENT_TYPE).await {
            Ok(()) => successes.push(format!("Successfully uploaded {}", image.name)),
            Err(e) => {
                tracing::warn!(name = %image.name, error = %e, "Image upload failed");
                errors.push(format!("Error uploading {}: {e}", image.name));
            }
        }
    }

    let report = UploadReport::from_messages(successes, errors);
    if report.is_error() {
        tracing::warn!(failed = report.error_messages.len(), "Image upload finished with errors");
    } else {
        tracing::info!("Image upload complete");
    }
    report
}

/// Fetch each remote file and stream it to the engine.
pub async fn upload_file_urls(api: &dyn EngineApi, files: &[FileUrlInput]) -> UploadReport {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for file in files {
        tracing::info!(name = %file.name, url = %file.url, "Downloading input file");
        match api.upload_from_url(&file.name, &file.url).await {
            Ok(()) => successes.push(format!("Successfully uploaded {}", file.name)),
            Err(e) => {
                tracing::warn!(name = %file.name, error = %e, "File upload failed");
                errors.push(format!("Error uploading {}: {e}", file.name));
            }
        }
    }

    let report = UploadReport::from_messages(successes, errors);
    if !files.is_empty() {
        if report.is_error() {
            tracing::warn!(failed = report.error_messages.len(), "File upload finished with errors");
        } else {
            tracing::info!("File upload complete");
        }
    }
    report
}
