//! S3-compatible [`ObjectStore`] backed by `aws-sdk-s3`.
//!
//! Each target gets its own client with static credentials and a custom
//! endpoint, so per-job buckets on R2, MinIO or AWS all work the same way.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use crate::{
    content_type_for, path_style_url, ObjectStore, StorageError, StorageTarget, StoreConnector,
    UrlStyle,
};

/// Attempts per request, including the first one.
const MAX_ATTEMPTS: u32 = 3;

/// Provider name attached to the static credentials.
const CREDENTIALS_PROVIDER: &str = "genjob-static";

/// One bucket on an S3-compatible service.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    endpoint_url: String,
    bucket: String,
    url_style: UrlStyle,
}

impl S3Store {
    /// Build a client for `target`. No network I/O happens here.
    pub fn new(target: &StorageTarget) -> Self {
        let credentials = Credentials::new(
            target.credentials.access_key_id.clone(),
            target.credentials.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(target.endpoint())
            .region(Region::new(target.region().to_string()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            endpoint_url: target.endpoint().to_string(),
            bucket: target.bucket.clone(),
            url_style: target.url_style,
        }
    }

    async fn presigned_url(
        &self,
        key: &str,
        expires_in: std::time::Duration,
    ) -> Result<String, StorageError> {
        let presign_error = |reason: String| StorageError::Presign {
            key: key.to_string(),
            reason,
        };

        let config = PresigningConfig::expires_in(expires_in).map_err(|e| presign_error(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| presign_error(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload_file(&self, path: &Path, key: &str) -> Result<String, StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(path))
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!(bucket = %self.bucket, key, "Uploaded artifact");

        match self.url_style {
            UrlStyle::PathStyle => Ok(path_style_url(&self.endpoint_url, &self.bucket, key)),
            UrlStyle::Presigned { expires_in } => self.presigned_url(key, expires_in).await,
        }
    }
}

/// [`StoreConnector`] producing [`S3Store`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

impl StoreConnector for S3Connector {
    fn connect(&self, target: &StorageTarget) -> Arc<dyn ObjectStore> {
        Arc::new(S3Store::new(target))
    }
}
