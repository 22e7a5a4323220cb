//! Typed views of the `/prompt` and `/history/{id}` responses.
//!
//! Only the fields the pipeline acts on are modelled; everything else in
//! the engine's payloads is ignored.

use std::collections::HashMap;

use serde::Deserialize;

/// Descriptor `type` marking a file written to the engine's output folder.
pub const OUTPUT_KIND: &str = "output";

/// Status string ComfyUI reports for a failed execution.
const STATUS_ERROR: &str = "error";

/// Response returned by the ComfyUI `/prompt` endpoint after queuing a
/// workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
    /// Per-node validation errors; an empty object when the graph is valid.
    #[serde(default)]
    pub node_errors: serde_json::Value,
}

impl SubmitResponse {
    /// Whether the engine rejected any node of the submitted graph.
    pub fn has_node_errors(&self) -> bool {
        is_non_empty(&self.node_errors)
    }
}

/// Body of a `400` from `/prompt` when graph validation fails.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRejection {
    #[serde(default)]
    pub error: serde_json::Value,
    #[serde(default)]
    pub node_errors: serde_json::Value,
}

impl WorkflowRejection {
    pub fn has_node_errors(&self) -> bool {
        is_non_empty(&self.node_errors)
    }
}

fn is_non_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// `/history/{id}` body: prompt id -> record. Empty until the engine has
/// picked the prompt up.
pub type History = HashMap<String, HistoryEntry>;

/// One prompt's execution record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Either a bare status string or an object with `status_str`.
    #[serde(default)]
    pub status: serde_json::Value,
    /// node id -> output slot -> descriptor or list of descriptors.
    #[serde(default)]
    pub outputs: serde_json::Map<String, serde_json::Value>,
    /// Some engine builds attach an error payload here.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
}

impl HistoryEntry {
    /// Whether the engine reports this execution as failed.
    pub fn is_error(&self) -> bool {
        match &self.status {
            serde_json::Value::String(s) => s == STATUS_ERROR,
            serde_json::Value::Object(obj) => {
                obj.get("status_str").and_then(serde_json::Value::as_str) == Some(STATUS_ERROR)
            }
            _ => false,
        }
    }

    /// Whether any node has produced outputs yet.
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// The engine's diagnostic payload for a failed execution.
    pub fn diagnostic(&self) -> serde_json::Value {
        self.output.clone().unwrap_or_else(|| self.status.clone())
    }
}

/// A file reported in a node's outputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputDescriptor {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl OutputDescriptor {
    /// Parse a descriptor; anything that is not an object yields `None`.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Only files of kind `output` with a filename count as generated
    /// artifacts (temp previews and inputs do not).
    pub fn is_generated_output(&self) -> bool {
        self.filename.is_some() && self.kind.as_deref() == Some(OUTPUT_KIND)
    }
}
