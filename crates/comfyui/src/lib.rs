//! ComfyUI HTTP control-plane client.
//!
//! Provides the [`api::EngineApi`] seam used by the job pipeline, its
//! [`reqwest`]-backed implementation, and typed views of the `/prompt`
//! and `/history` responses.

pub mod api;
pub mod history;
