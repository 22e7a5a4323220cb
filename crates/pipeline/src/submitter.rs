//! Workflow submission.

use genjob_comfyui::api::{ComfyUIApiError, EngineApi};
use genjob_core::job::Workflow;

use crate::error::JobError;

/// Queue `workflow` on the engine and return its prompt id.
///
/// Node-level validation errors are terminal, whether the engine reports
/// them in a `400` body or alongside a queued prompt.
pub async fn submit_workflow(api: &dyn EngineApi, workflow: &Workflow) -> Result<String, JobError> {
    let graph = serde_json::Value::Object(workflow.clone());
    let response = api.submit_workflow(&graph).await.map_err(|e| match e {
        ComfyUIApiError::WorkflowRejected { error, node_errors } => {
            tracing::error!(%error, %node_errors, "Workflow rejected by ComfyUI");
            JobError::NodeErrors(node_errors)
        }
        other => JobError::Submission(other),
    })?;

    if response.has_node_errors() {
        tracing::error!(node_errors = %response.node_errors, "Workflow rejected by ComfyUI");
        return Err(JobError::NodeErrors(response.node_errors));
    }

    tracing::info!(prompt_id = %response.prompt_id, number = ?response.number, "Queued workflow");
    Ok(response.prompt_id)
}
