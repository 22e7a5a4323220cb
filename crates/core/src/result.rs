//! Result shapes handed back to the host runtime.

use serde::{Deserialize, Serialize};

/// Terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Error,
}

/// Either the published outputs or a human-readable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobMessage {
    /// URLs or base64 payloads, in resolved path order.
    Outputs(Vec<String>),
    Diagnostic(String),
}

/// A well-formed pipeline result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub message: JobMessage,
    /// Passthrough flag asking the host to recycle the worker.
    pub refresh_worker: bool,
    /// Per-item diagnostics of a failed asset batch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl JobResult {
    pub fn success(outputs: Vec<String>, refresh_worker: bool) -> Self {
        Self {
            status: JobStatus::Success,
            message: JobMessage::Outputs(outputs),
            refresh_worker,
            details: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, refresh_worker: bool) -> Self {
        Self {
            status: JobStatus::Error,
            message: JobMessage::Diagnostic(message.into()),
            refresh_worker,
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

/// What the host runtime receives for one invocation.
///
/// Configuration-class failures (bad input, unusable trigger) are reported
/// as a bare `{"error": ...}`; everything else is a [`JobResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutcome {
    Completed(JobResult),
    Rejected { error: String },
}

impl JobOutcome {
    pub fn rejected(error: impl Into<String>) -> Self {
        Self::Rejected {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(r) if r.status == JobStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_serializes_output_list() {
        let outcome = JobOutcome::Completed(JobResult::success(vec!["a".into()], true));
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "status": "success", "message": ["a"], "refresh_worker": true })
        );
    }

    #[test]
    fn error_with_details_serializes_details() {
        let result = JobResult::error("Some images failed to upload", false)
            .with_details(vec!["Error uploading a.png: boom".into()]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "Some images failed to upload");
        assert_eq!(value["details"][0], "Error uploading a.png: boom");
    }

    #[test]
    fn rejected_serializes_bare_error() {
        let outcome = JobOutcome::rejected("Missing 'workflow' parameter");
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "error": "Missing 'workflow' parameter" })
        );
        assert!(!outcome.is_success());
    }
}
