//! Pipeline tuning parameters.
//!
//! Built once at the process boundary and shared read-only by every job.

use std::path::PathBuf;
use std::time::Duration;

use genjob_storage::StorageTarget;

/// Default interval between engine availability probes.
pub const DEFAULT_AVAILABILITY_INTERVAL: Duration = Duration::from_millis(50);
/// Default number of engine availability probes.
pub const DEFAULT_AVAILABILITY_MAX_ATTEMPTS: u32 = 500;
/// Default interval between completion polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Default number of counted completion polls.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 5000;
/// Where ComfyUI writes generated files by default.
pub const DEFAULT_OUTPUT_ROOT: &str = "/comfyui/output";

/// A bounded retry budget: at most `max_attempts` counted probes with
/// `interval` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Which completion polls count against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollCounting {
    /// Every probe counts, including records that exist but have neither
    /// outputs nor an error. Bounded in all cases.
    #[default]
    EveryProbe,
    /// Only probes where the record is still absent count. A record stuck
    /// without outputs is polled until it changes.
    AbsentOnly,
}

/// Immutable configuration shared by all jobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Engine reachability probe run before any job work.
    pub availability: RetryPolicy,
    /// Completion polling of `/history`.
    pub completion: RetryPolicy,
    pub poll_counting: PollCounting,
    /// Folder the engine writes outputs to, as seen by this process.
    pub output_root: PathBuf,
    /// Passed through to every [`JobResult`](genjob_core::result::JobResult).
    pub refresh_worker: bool,
    /// Global bucket used for embedded-mode jobs when configured.
    pub global_bucket: Option<StorageTarget>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            availability: RetryPolicy::new(
                DEFAULT_AVAILABILITY_INTERVAL,
                DEFAULT_AVAILABILITY_MAX_ATTEMPTS,
            ),
            completion: RetryPolicy::new(DEFAULT_POLL_INTERVAL, DEFAULT_POLL_MAX_ATTEMPTS),
            poll_counting: PollCounting::default(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            refresh_worker: false,
            global_bucket: None,
        }
    }
}
