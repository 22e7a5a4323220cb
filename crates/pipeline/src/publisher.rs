//! Turn collected artifact paths into the strings returned to the caller.
//!
//! * Object-storage mode uploads every existing artifact to the job's own
//!   bucket and returns path-style URLs. Missing files are skipped.
//! * Embedded mode returns presigned URLs from the global bucket when one is
//!   configured, base64 file contents otherwise. A missing file is an error.

use std::path::{Path, PathBuf};

use base64::prelude::*;
use genjob_core::env::{prefixed_key, Environment};
use genjob_core::job::{OutputConfig, OutputMode};
use genjob_storage::{
    object_key, ObjectStore, StorageCredentials, StorageTarget, StoreConnector, UrlStyle,
};

use crate::error::JobError;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const REGION_VAR: &str = "AWS_REGION";

pub struct ResultPublisher<'a> {
    connector: &'a dyn StoreConnector,
    env: &'a Environment,
    global_bucket: Option<&'a StorageTarget>,
}

impl<'a> ResultPublisher<'a> {
    pub fn new(
        connector: &'a dyn StoreConnector,
        env: &'a Environment,
        global_bucket: Option<&'a StorageTarget>,
    ) -> Self {
        Self {
            connector,
            env,
            global_bucket,
        }
    }

    /// Publish `paths` according to the job's output settings.
    pub async fn publish(
        &self,
        job_id: &str,
        paths: &[PathBuf],
        output: Option<&OutputConfig>,
    ) -> Result<Vec<String>, JobError> {
        match output {
            Some(config) if config.mode == OutputMode::ObjectStorage => {
                self.publish_to_bucket(job_id, paths, config).await
            }
            _ => self.publish_embedded(job_id, paths).await,
        }
    }

    async fn publish_to_bucket(
        &self,
        job_id: &str,
        paths: &[PathBuf],
        config: &OutputConfig,
    ) -> Result<Vec<String>, JobError> {
        let existing: Vec<&PathBuf> = paths
            .iter()
            .filter(|path| {
                let exists = path.is_file();
                if !exists {
                    tracing::warn!(path = %path.display(), "Output file does not exist, skipping");
                }
                exists
            })
            .collect();

        let target = self.job_target(config)?;
        let store = self.connector.connect(&target);

        tracing::info!(
            bucket = %target.bucket,
            count = existing.len(),
            "Uploading outputs to object storage"
        );

        let mut urls = Vec::with_capacity(existing.len());
        for path in existing {
            urls.push(upload(store.as_ref(), job_id, path).await?);
        }
        Ok(urls)
    }

    async fn publish_embedded(&self, job_id: &str, paths: &[PathBuf]) -> Result<Vec<String>, JobError> {
        let store = self.global_bucket.map(|target| {
            tracing::info!(bucket = %target.bucket, "Uploading outputs to the global bucket");
            self.connector.connect(target)
        });

        let mut published = Vec::with_capacity(paths.len());
        for path in paths {
            if !path.is_file() {
                tracing::error!(path = %path.display(), "Output file vanished before publishing");
                return Err(JobError::Collection(format!(
                    "the image does not exist in the specified output folder: {}",
                    path.display()
                )));
            }

            let value = match &store {
                Some(store) => upload(store.as_ref(), job_id, path).await?,
                None => encode_file(path).await?,
            };
            published.push(value);
        }
        Ok(published)
    }

    /// Build the job's bucket target from its credential prefix.
    fn job_target(&self, config: &OutputConfig) -> Result<StorageTarget, JobError> {
        let prefix = config.key_prefix.as_str();
        let access_key_id = self.env.get_prefixed(prefix, ACCESS_KEY_ID_VAR);
        let secret_access_key = self.env.get_prefixed(prefix, SECRET_ACCESS_KEY_VAR);

        let (Some(access_key_id), Some(secret_access_key)) = (access_key_id, secret_access_key)
        else {
            let keys: Vec<String> = [
                (ACCESS_KEY_ID_VAR, access_key_id),
                (SECRET_ACCESS_KEY_VAR, secret_access_key),
            ]
            .into_iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| prefixed_key(prefix, key))
            .collect();
            tracing::error!(missing = ?keys, "Storage credentials are not configured");
            return Err(JobError::CredentialsMissing { keys });
        };

        Ok(StorageTarget {
            endpoint_url: config.endpoint_url.clone(),
            bucket: config.bucket.clone(),
            region: self.env.get_prefixed(prefix, REGION_VAR).map(str::to_owned),
            credentials: StorageCredentials {
                access_key_id: access_key_id.to_owned(),
                secret_access_key: secret_access_key.to_owned(),
            },
            url_style: UrlStyle::PathStyle,
        })
    }
}

async fn upload(store: &dyn ObjectStore, job_id: &str, path: &Path) -> Result<String, JobError> {
    let key = object_key(job_id, path).map_err(|e| JobError::StorageUpload(e.to_string()))?;
    let url = store.upload_file(path, &key).await.map_err(|e| {
        tracing::error!(key = %key, error = %e, "Storage upload failed");
        JobError::StorageUpload(e.to_string())
    })?;
    tracing::debug!(key = %key, "Uploaded output");
    Ok(url)
}

async fn encode_file(path: &Path) -> Result<String, JobError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        JobError::Collection(format!("failed to read {}: {e}", path.display()))
    })?;
    Ok(BASE64_STANDARD.encode(bytes))
}
