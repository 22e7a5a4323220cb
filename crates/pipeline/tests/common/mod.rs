//! In-memory fakes for the pipeline seams.
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use genjob_comfyui::api::{ComfyUIApiError, EngineApi};
use genjob_comfyui::history::{History, HistoryEntry, SubmitResponse};
use genjob_core::job::TriggerConfig;
use genjob_pipeline::retry::Sleeper;
use genjob_pipeline::{PipelineConfig, RetryPolicy};
use genjob_storage::{
    path_style_url, ObjectStore, StorageError, StorageTarget, StoreConnector, UrlStyle,
};
use genjob_trigger::{TriggerError, TriggerFactory, TriggerHandler};

pub const PROMPT_ID: &str = "prompt-1";

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// What one `/history` probe returns.
#[derive(Debug, Clone)]
pub enum HistoryStep {
    Absent,
    Pending,
    Failed(Value),
    Done(Value),
    Transport,
}

/// Scripted engine. Once the history script runs out every probe reports
/// the record as absent.
#[derive(Default)]
pub struct FakeEngine {
    failing_pings: u32,
    pings: AtomicU32,
    history: Mutex<VecDeque<HistoryStep>>,
    history_probes: AtomicU32,
    failing_uploads: HashSet<String>,
    pub uploaded: Mutex<Vec<(String, Vec<u8>)>>,
    pub fetched: Mutex<Vec<(String, String)>>,
    node_errors: Option<Value>,
    rejection: Option<Value>,
    pub submitted: Mutex<Vec<Value>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_pings(mut self, count: u32) -> Self {
        self.failing_pings = count;
        self
    }

    pub fn with_history(self, steps: impl IntoIterator<Item = HistoryStep>) -> Self {
        self.history.lock().unwrap().extend(steps);
        self
    }

    pub fn with_failing_upload(mut self, name: &str) -> Self {
        self.failing_uploads.insert(name.to_string());
        self
    }

    pub fn with_node_errors(mut self, errors: Value) -> Self {
        self.node_errors = Some(errors);
        self
    }

    /// Answer `/prompt` with a `400` carrying `node_errors`.
    pub fn rejecting_workflow(mut self, node_errors: Value) -> Self {
        self.rejection = Some(node_errors);
        self
    }

    pub fn pings(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn history_probes(&self) -> u32 {
        self.history_probes.load(Ordering::SeqCst)
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploaded
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn upload_result(&self, name: &str) -> Result<(), ComfyUIApiError> {
        if self.failing_uploads.contains(name) {
            return Err(ComfyUIApiError::ApiError {
                status: 500,
                body: "disk full".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EngineApi for FakeEngine {
    async fn ping(&self) -> Result<(), ComfyUIApiError> {
        let n = self.pings.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failing_pings {
            return Err(ComfyUIApiError::ApiError {
                status: 503,
                body: "starting".into(),
            });
        }
        Ok(())
    }

    async fn upload_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ComfyUIApiError> {
        self.upload_result(name)?;
        self.uploaded.lock().unwrap().push((name.to_string(), bytes));
        Ok(())
    }

    async fn upload_from_url(&self, name: &str, url: &str) -> Result<(), ComfyUIApiError> {
        self.upload_result(name)?;
        self.fetched
            .lock()
            .unwrap()
            .push((name.to_string(), url.to_string()));
        Ok(())
    }

    async fn submit_workflow(&self, workflow: &Value) -> Result<SubmitResponse, ComfyUIApiError> {
        self.submitted.lock().unwrap().push(workflow.clone());
        if let Some(node_errors) = &self.rejection {
            return Err(ComfyUIApiError::WorkflowRejected {
                error: json!({ "type": "prompt_outputs_failed_validation" }),
                node_errors: node_errors.clone(),
            });
        }
        Ok(SubmitResponse {
            prompt_id: PROMPT_ID.to_string(),
            number: Some(1),
            node_errors: self.node_errors.clone().unwrap_or_else(|| json!({})),
        })
    }

    async fn get_history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError> {
        self.history_probes.fetch_add(1, Ordering::SeqCst);
        let step = self
            .history
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(HistoryStep::Absent);

        let entry = match step {
            HistoryStep::Absent => return Ok(History::new()),
            HistoryStep::Transport => {
                return Err(ComfyUIApiError::ApiError {
                    status: 502,
                    body: "bad gateway".into(),
                })
            }
            HistoryStep::Pending => json!({ "status": { "status_str": "running" }, "outputs": {} }),
            HistoryStep::Failed(payload) => {
                json!({ "status": { "status_str": "error", "messages": payload }, "outputs": {} })
            }
            HistoryStep::Done(outputs) => {
                json!({ "status": { "status_str": "success" }, "outputs": outputs })
            }
        };

        let entry: HistoryEntry = serde_json::from_value(entry).unwrap();
        Ok(History::from([(prompt_id.to_string(), entry)]))
    }
}

/// Outputs payload listing `a.png` (and any other names) at the output root.
pub fn image_outputs(names: &[&str]) -> Value {
    let images: Vec<Value> = names
        .iter()
        .map(|name| json!({ "filename": name, "subfolder": "", "type": "output" }))
        .collect();
    json!({ "9": { "images": images } })
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub bucket: String,
    pub access_key_id: String,
    pub region: Option<String>,
    pub key: String,
}

/// Connector whose stores record uploads instead of talking to S3.
#[derive(Default)]
pub struct RecordingConnector {
    pub uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    fail_after: Option<usize>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload after the first `count` fails.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.key.clone())
            .collect()
    }
}

impl StoreConnector for RecordingConnector {
    fn connect(&self, target: &StorageTarget) -> Arc<dyn ObjectStore> {
        Arc::new(RecordingStore {
            target: target.clone(),
            uploads: Arc::clone(&self.uploads),
            fail_after: self.fail_after,
        })
    }
}

struct RecordingStore {
    target: StorageTarget,
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    fail_after: Option<usize>,
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn upload_file(&self, path: &Path, key: &str) -> Result<String, StorageError> {
        let mut uploads = self.uploads.lock().unwrap();
        if self.fail_after.is_some_and(|limit| uploads.len() >= limit) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                reason: "access denied".into(),
            });
        }
        assert!(path.is_file(), "uploaded path must exist");
        uploads.push(RecordedUpload {
            bucket: self.target.bucket.clone(),
            access_key_id: self.target.credentials.access_key_id.clone(),
            region: self.target.region.clone(),
            key: key.to_string(),
        });

        let url = path_style_url(self.target.endpoint(), &self.target.bucket, key);
        Ok(match self.target.url_style {
            UrlStyle::PathStyle => url,
            UrlStyle::Presigned { .. } => format!("{url}?X-Amz-Signature=fake"),
        })
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Factory producing handlers that record every `handle` payload.
#[derive(Default)]
pub struct RecordingTriggers {
    pub handled: Arc<Mutex<Vec<String>>>,
    missing_credential: Option<String>,
    fail_dispatch: bool,
}

impl RecordingTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_credential(mut self, key: &str) -> Self {
        self.missing_credential = Some(key.to_string());
        self
    }

    pub fn failing_dispatch(mut self) -> Self {
        self.fail_dispatch = true;
        self
    }

    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }
}

impl TriggerFactory for RecordingTriggers {
    fn create(&self, config: &TriggerConfig) -> Result<Box<dyn TriggerHandler>, TriggerError> {
        match config {
            TriggerConfig::Supabase(_) => Ok(Box::new(RecordingHandler {
                handled: Arc::clone(&self.handled),
                missing_credential: self.missing_credential.clone(),
                fail_dispatch: self.fail_dispatch,
            })),
            TriggerConfig::Unsupported { service } => {
                Err(TriggerError::Unsupported(service.clone()))
            }
        }
    }
}

struct RecordingHandler {
    handled: Arc<Mutex<Vec<String>>>,
    missing_credential: Option<String>,
    fail_dispatch: bool,
}

#[async_trait]
impl TriggerHandler for RecordingHandler {
    fn validate(&self) -> Result<(), TriggerError> {
        match &self.missing_credential {
            Some(key) => Err(TriggerError::MissingCredential(key.clone())),
            None => Ok(()),
        }
    }

    async fn handle(&self, output: &str) -> Result<String, TriggerError> {
        self.handled.lock().unwrap().push(output.to_string());
        if self.fail_dispatch {
            return Err(TriggerError::HttpStatus {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok("[]".into())
    }
}

// ---------------------------------------------------------------------------
// Sleeper & config
// ---------------------------------------------------------------------------

/// Counts sleeps without waiting.
#[derive(Default)]
pub struct CountingSleeper {
    sleeps: AtomicU32,
}

impl CountingSleeper {
    pub fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Small budgets so exhaustion tests stay quick.
pub fn test_config(output_root: &Path) -> PipelineConfig {
    PipelineConfig {
        availability: RetryPolicy::new(Duration::from_millis(1), 3),
        completion: RetryPolicy::new(Duration::from_millis(1), 5),
        output_root: output_root.to_path_buf(),
        ..PipelineConfig::default()
    }
}
