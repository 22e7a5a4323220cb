//! Resolve engine output descriptors to files on disk.

use std::path::{Path, PathBuf};

use genjob_comfyui::history::OutputDescriptor;

use crate::error::JobError;
use crate::poller::Outputs;

const SIDECAR_EXTENSION: &str = "txt";

/// Flatten `node -> slot -> descriptor | [descriptor]` into the generated
/// output descriptors, in payload order.
pub fn generated_descriptors(outputs: &Outputs) -> Vec<OutputDescriptor> {
    let mut descriptors = Vec::new();

    for node_output in outputs.values() {
        let Some(slots) = node_output.as_object() else {
            continue;
        };
        for slot in slots.values() {
            match slot {
                serde_json::Value::Array(items) => {
                    descriptors.extend(items.iter().filter_map(OutputDescriptor::from_value));
                }
                other => descriptors.extend(OutputDescriptor::from_value(other)),
            }
        }
    }

    descriptors.retain(OutputDescriptor::is_generated_output);
    descriptors
}

/// Resolve every generated artifact under `output_root`.
///
/// Text sidecars (same stem, `.txt`) that exist on disk are appended after
/// all artifacts. Fails when nothing was generated.
pub fn collect_outputs(outputs: &Outputs, output_root: &Path) -> Result<Vec<PathBuf>, JobError> {
    let mut paths: Vec<PathBuf> = generated_descriptors(outputs)
        .into_iter()
        .filter_map(|d| {
            let filename = d.filename?;
            Some(output_root.join(&d.subfolder).join(filename))
        })
        .collect();

    if paths.is_empty() {
        tracing::error!("Engine reported no generated outputs");
        return Err(JobError::Collection("No image generated".into()));
    }

    let mut sidecars = Vec::new();
    for path in &paths {
        let sidecar = path.with_extension(SIDECAR_EXTENSION);
        if sidecar.is_file() && !paths.contains(&sidecar) && !sidecars.contains(&sidecar) {
            sidecars.push(sidecar);
        }
    }
    paths.extend(sidecars);

    for path in &paths {
        tracing::debug!(path = %path.display(), "Collected output");
    }
    Ok(paths)
}
