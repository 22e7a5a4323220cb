//! Stage errors and their mapping onto host-visible outcomes.

use std::fmt;

use genjob_comfyui::api::ComfyUIApiError;
use genjob_core::error::ValidationError;
use genjob_core::result::{JobOutcome, JobResult};

use crate::uploader::UploadReport;

/// Which asset batch an upload report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetBatch {
    Images,
    Files,
}

impl fmt::Display for AssetBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Images => f.write_str("images"),
            Self::Files => f.write_str("files"),
        }
    }
}

/// Broad category of a [`JobError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The job or worker is misconfigured; retrying the same payload
    /// cannot succeed.
    Configuration,
    /// Something went wrong while running the job.
    Operational,
}

/// Every way a job can fail.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Error validating input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Error creating trigger handler: Unsupported service: {0}")]
    UnsupportedTrigger(String),

    #[error("Error creating trigger handler: {0}")]
    TriggerValidation(String),

    #[error("ComfyUI API unreachable after {attempts} attempts")]
    EngineUnavailable { attempts: u32 },

    #[error("Some {batch} failed to upload")]
    Upload {
        batch: AssetBatch,
        report: UploadReport,
    },

    #[error("Error found when queuing workflow: {0}")]
    NodeErrors(serde_json::Value),

    #[error("Error queuing workflow: {0}")]
    Submission(#[source] ComfyUIApiError),

    #[error("Error in generation: {0}")]
    Generation(serde_json::Value),

    #[error("Max retries reached while waiting for image generation ({attempts} attempts)")]
    PollTimeout { attempts: u32 },

    #[error("Error waiting for image generation: {0}")]
    PollTransport(#[source] ComfyUIApiError),

    #[error("{0}")]
    Collection(String),

    #[error("Storage credentials are missing: {}", .keys.join(", "))]
    CredentialsMissing { keys: Vec<String> },

    #[error("Error uploading files to storage: {0}")]
    StorageUpload(String),
}

impl JobError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::UnsupportedTrigger(_) | Self::TriggerValidation(_) => {
                ErrorClass::Configuration
            }
            _ => ErrorClass::Operational,
        }
    }

    /// Convert into what the host runtime receives.
    pub fn into_outcome(self, refresh_worker: bool) -> JobOutcome {
        match self.class() {
            ErrorClass::Configuration => JobOutcome::rejected(self.to_string()),
            ErrorClass::Operational => {
                let message = self.to_string();
                let details = match self {
                    Self::Upload { report, .. } => report.error_messages,
                    _ => Vec::new(),
                };
                JobOutcome::Completed(
                    JobResult::error(message, refresh_worker).with_details(details),
                )
            }
        }
    }
}
