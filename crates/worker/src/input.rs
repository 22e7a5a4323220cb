//! Job envelope input.
//!
//! The host hands the worker one `{id, input}` envelope, either as a file
//! path argument or on stdin.

use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read job envelope from {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("job envelope is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the envelope comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeSource {
    File(PathBuf),
    Stdin,
}

impl EnvelopeSource {
    /// A path argument selects a file; no argument (or `-`) reads stdin.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("-") => Self::Stdin,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }
}

/// Read and parse the envelope.
pub async fn read_envelope(source: &EnvelopeSource) -> Result<serde_json::Value, InputError> {
    let text = match source {
        EnvelopeSource::File(path) => read_file(path).await?,
        EnvelopeSource::Stdin => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .map_err(|source| InputError::Io {
                    origin: "stdin".into(),
                    source,
                })?;
            text
        }
    };
    Ok(serde_json::from_str(&text)?)
}

async fn read_file(path: &Path) -> Result<String, InputError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Io {
            origin: path.display().to_string(),
            source,
        })
}
