//! The validated job model.
//!
//! A [`Job`] is built once per invocation by
//! [`validation::parse_input`](crate::validation::parse_input) and is never
//! mutated afterwards. The workflow graph is opaque: it is forwarded to the
//! engine verbatim and never interpreted here.

use serde::Deserialize;

use crate::error::ValidationError;

/// Opaque workflow graph, keyed by node id. Key order is preserved.
pub type Workflow = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A single unit of work delivered by the host runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub workflow: Workflow,
    pub images: Vec<ImageInput>,
    pub file_urls: Vec<FileUrlInput>,
    pub output: Option<OutputConfig>,
    pub trigger: Option<TriggerConfig>,
}

/// An input image carried inline as base64.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageInput {
    pub name: String,
    /// Base64 payload, optionally wrapped in a `data:<mime>;base64,` URI.
    pub image: String,
}

/// An input file the worker fetches itself before submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileUrlInput {
    pub name: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Output configuration
// ---------------------------------------------------------------------------

/// Where the published artifacts end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum OutputMode {
    /// Upload to the job's own S3-compatible bucket.
    #[serde(rename = "s3")]
    ObjectStorage,
    /// Return base64 payloads (or global-bucket URLs) inline.
    #[default]
    #[serde(rename = "url", alias = "embedded", alias = "base64")]
    Embedded,
}

/// Per-job output publishing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "type")]
    pub mode: OutputMode,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub endpoint_url: String,
    /// Selects the `{key_prefix}AWS_*` credential pair.
    #[serde(default)]
    pub key_prefix: String,
}

impl OutputConfig {
    /// Object storage needs a bucket, an endpoint and a credential prefix.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.mode != OutputMode::ObjectStorage {
            return Ok(());
        }
        for (field, value) in [
            ("bucket", &self.bucket),
            ("endpoint_url", &self.endpoint_url),
            ("key_prefix", &self.key_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::Shape(format!(
                    "'output.{field}' must not be empty when 'output.type' is 's3'"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Service tag of the Supabase database-update trigger.
pub const SERVICE_SUPABASE: &str = "supabase";

/// Downstream notification requested by a job, discriminated by `service`.
///
/// Unknown service tags are kept as [`TriggerConfig::Unsupported`] so that
/// handler construction can reject them with a dedicated error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerConfig {
    Supabase(SupabaseTrigger),
    Unsupported { service: String },
}

impl TriggerConfig {
    /// The `service` tag this trigger was declared with.
    pub fn service(&self) -> &str {
        match self {
            Self::Supabase(_) => SERVICE_SUPABASE,
            Self::Unsupported { service } => service,
        }
    }

    /// Parse a raw trigger object, checking the fields of known variants.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let service = value
            .get("service")
            .and_then(serde_json::Value::as_str)
            .ok_or(ValidationError::Missing("trigger.service"))?;

        match service {
            SERVICE_SUPABASE => {
                let trigger: SupabaseTrigger = serde_json::from_value(value.clone())
                    .map_err(|e| {
                        ValidationError::Shape(format!("invalid '{SERVICE_SUPABASE}' trigger: {e}"))
                    })?;
                if trigger.key_prefix.is_empty() {
                    return Err(ValidationError::Shape(
                        "'trigger.key_prefix' must not be empty".into(),
                    ));
                }
                Ok(Self::Supabase(trigger))
            }
            other => Ok(Self::Unsupported {
                service: other.to_string(),
            }),
        }
    }
}

/// Update one row of a Supabase table once the job has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SupabaseTrigger {
    /// Selects the `{key_prefix}SUPABASE_*` credential pair.
    pub key_prefix: String,
    pub table: String,
    pub id_field: String,
    /// Column receiving the published output list.
    pub output_field: String,
    #[serde(default)]
    pub status_field: Option<String>,
    /// Value of `id_field` identifying the row to update.
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}
