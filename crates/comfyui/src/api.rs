//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the endpoints a job worker needs (reachability, input upload,
//! workflow submission, history retrieval) using [`reqwest`]. The
//! [`EngineApi`] trait is the seam the pipeline depends on, so stages can
//! be exercised against an in-memory engine.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::history::{History, SubmitResponse, WorkflowRejection};

/// Content type used for inline (base64) image uploads.
pub const IMAGE_CONTENT_TYPE: &str = "image/png";

/// Content type used for files streamed from a remote URL.
pub const STREAM_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// `/prompt` refused the graph with per-node validation errors.
    #[error("ComfyUI rejected the workflow: {error}")]
    WorkflowRejected {
        error: serde_json::Value,
        node_errors: serde_json::Value,
    },

    /// A remote input file could not be fetched.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// Operations the job pipeline needs from an inference engine.
#[async_trait]
pub trait EngineApi: Send + Sync {
    /// Succeeds when the engine answers its root endpoint with a 2xx.
    async fn ping(&self) -> Result<(), ComfyUIApiError>;

    /// Upload an in-memory file to the engine's input folder.
    async fn upload_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ComfyUIApiError>;

    /// Fetch `url` and stream the body into the engine's input folder
    /// without buffering the whole file.
    async fn upload_from_url(&self, name: &str, url: &str) -> Result<(), ComfyUIApiError>;

    /// Queue a workflow for execution.
    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyUIApiError>;

    /// Retrieve the history record(s) for a submitted prompt.
    async fn get_history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError>;
}

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (carries timeouts and connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// Create a client from a bare `host:port` pair.
    pub fn from_host(client: reqwest::Client, host: &str) -> Self {
        if host.starts_with("http://") || host.starts_with("https://") {
            Self::with_client(client, host)
        } else {
            Self::with_client(client, format!("http://{host}"))
        }
    }

    /// Base HTTP API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- private helpers ----

    /// POST a prepared multipart part to `/upload/image` with overwrite on.
    async fn post_upload(&self, part: Part) -> Result<(), ComfyUIApiError> {
        let form = Form::new().part("image", part).text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyUIApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl EngineApi for ComfyUIApi {
    async fn ping(&self) -> Result<(), ComfyUIApiError> {
        let response = self.client.get(format!("{}/", self.api_url)).send().await?;
        Self::check_status(response).await
    }

    async fn upload_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ComfyUIApiError> {
        let part = Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(content_type)?;
        self.post_upload(part).await
    }

    async fn upload_from_url(&self, name: &str, url: &str) -> Result<(), ComfyUIApiError> {
        let fetch_error = |reason: String| ComfyUIApiError::Fetch {
            url: url.to_string(),
            reason,
        };

        let download = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = download.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {}", status.as_u16())));
        }

        let length = download.content_length();
        tracing::debug!(name, url, ?length, "Streaming remote file to ComfyUI");

        let body = reqwest::Body::wrap_stream(download.bytes_stream());
        let part = match length {
            Some(len) => Part::stream_with_length(body, len),
            None => Part::stream(body),
        }
        .file_name(name.to_string())
        .mime_str(STREAM_CONTENT_TYPE)?;

        self.post_upload(part).await
    }

    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        // ComfyUI requires the graph under a top-level "prompt" key.
        let body = serde_json::json!({ "prompt": workflow });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(match serde_json::from_str::<WorkflowRejection>(&body) {
                Ok(rejection) if rejection.has_node_errors() => ComfyUIApiError::WorkflowRejected {
                    error: rejection.error,
                    node_errors: rejection.node_errors,
                },
                _ => ComfyUIApiError::ApiError { status: 400, body },
            });
        }

        Self::parse_response(response).await
    }

    async fn get_history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
