//! Job execution pipeline.
//!
//! Drives one job through the engine: trigger preparation, availability
//! probe, asset upload, submission, completion polling, output collection,
//! publishing and trigger dispatch. [`runner::JobRunner`] wires the stages
//! together; each stage lives in its own module and can be exercised in
//! isolation.

pub mod collector;
pub mod config;
pub mod error;
pub mod poller;
pub mod publisher;
pub mod retry;
pub mod runner;
pub mod submitter;
pub mod uploader;

pub use config::{PipelineConfig, PollCounting, RetryPolicy};
pub use error::{ErrorClass, JobError};
pub use runner::JobRunner;
