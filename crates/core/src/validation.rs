//! Input validation: raw host payload -> [`Job`].
//!
//! Strict on required fields, permissive on everything else: unknown keys
//! are ignored. The first structural problem found is reported.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::job::{FileUrlInput, ImageInput, Job, OutputConfig, TriggerConfig};

/// Parse the host envelope `{"id": ..., "input": {...}}`.
pub fn parse_envelope(envelope: &Value) -> Result<Job, ValidationError> {
    let obj = envelope
        .as_object()
        .ok_or_else(|| ValidationError::Shape("job must be a JSON object".into()))?;

    let id = match obj.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(ValidationError::Missing("id")),
    };

    let input = obj.get("input").ok_or(ValidationError::MissingInput)?;
    parse_input(id, input)
}

/// Validate a job input, given either as a JSON object or as a
/// JSON-encoded string.
pub fn parse_input(id: impl Into<String>, input: &Value) -> Result<Job, ValidationError> {
    let decoded;
    let input = match input {
        Value::Null => return Err(ValidationError::MissingInput),
        Value::String(raw) => {
            decoded = serde_json::from_str::<Value>(raw)?;
            &decoded
        }
        other => other,
    };

    let obj = input
        .as_object()
        .ok_or_else(|| ValidationError::Shape("input must be a JSON object".into()))?;

    let workflow = match obj.get("workflow") {
        None | Some(Value::Null) => return Err(ValidationError::Missing("workflow")),
        Some(Value::Object(workflow)) => workflow.clone(),
        Some(_) => {
            return Err(ValidationError::Shape(
                "'workflow' must be a JSON object".into(),
            ))
        }
    };

    let images: Vec<ImageInput> = optional_list(obj, "images", &["name", "image"])?;
    let file_urls: Vec<FileUrlInput> = optional_list(obj, "file_urls", &["name", "url"])?;

    let output = match obj.get("output") {
        None | Some(Value::Null) => None,
        Some(value @ Value::Object(_)) => {
            let output: OutputConfig = serde_json::from_value(value.clone()).map_err(|e| {
                ValidationError::Shape(format!(
                    "'output' must be an object with a valid 'type' key: {e}"
                ))
            })?;
            output.validate()?;
            Some(output)
        }
        Some(_) => {
            return Err(ValidationError::Shape(
                "'output' must be a dictionary with 'type', 'bucket', 'endpoint_url' and 'key_prefix' keys"
                    .into(),
            ))
        }
    };

    let trigger = match obj.get("trigger") {
        None | Some(Value::Null) => None,
        Some(value @ Value::Object(_)) => Some(TriggerConfig::from_value(value)?),
        Some(_) => {
            return Err(ValidationError::Shape(
                "'trigger' must be a JSON object".into(),
            ))
        }
    };

    Ok(Job {
        id: id.into(),
        workflow,
        images,
        file_urls,
        output,
        trigger,
    })
}

/// Read an optional list of objects that must each carry string `keys`.
fn optional_list<T: DeserializeOwned>(
    obj: &Map<String, Value>,
    field: &str,
    keys: &[&str],
) -> Result<Vec<T>, ValidationError> {
    let shape_error = || {
        let quoted: Vec<String> = keys.iter().map(|k| format!("'{k}'")).collect();
        ValidationError::Shape(format!(
            "'{field}' must be a list of objects with {} keys",
            quoted.join(" and ")
        ))
    };

    let items = match obj.get(field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(shape_error()),
    };

    items
        .iter()
        .map(|item| {
            let well_formed = keys
                .iter()
                .all(|key| item.get(*key).is_some_and(Value::is_string));
            if !well_formed {
                return Err(shape_error());
            }
            serde_json::from_value(item.clone()).map_err(|_| shape_error())
        })
        .collect()
}
