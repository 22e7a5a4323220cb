//! Engine availability and completion polling.
//!
//! [`CompletionPoller`] probes `/history/{prompt_id}` under the completion [`RetryPolicy`]:
//!
//! | History record                 | Outcome                                  |
//! |--------------------------------|------------------------------------------|
//! | absent                         | retry, counted                           |
//! | status reports an error        | [`JobError::Generation`], terminal       |
//! | non-empty `outputs`            | outputs returned, terminal               |
//! | present, neither               | retry, counted per [`PollCounting`]      |
//! | budget exhausted               | [`JobError::PollTimeout`]                |

use genjob_comfyui::api::EngineApi;

use crate::config::{PollCounting, RetryPolicy};
use crate::error::JobError;
use crate::retry::{retry_until, Attempt, RetryError, Sleeper};

/// Probe the engine until it answers or the availability budget runs out.
///
/// Any transport error or non-2xx answer counts as one failed attempt.
pub async fn wait_for_engine(
    api: &dyn EngineApi,
    sleeper: &dyn Sleeper,
    policy: &RetryPolicy,
) -> Result<(), JobError> {
    let result = retry_until(policy, sleeper, |probe| async move {
        match api.ping().await {
            Ok(()) => Attempt::Ready(probe),
            Err(e) => {
                tracing::trace!(probe, error = %e, "ComfyUI not reachable yet");
                Attempt::<u32, JobError>::Retry { counted: true }
            }
        }
    })
    .await;

    match result {
        Ok(probes) => {
            tracing::info!(probes, "ComfyUI API is reachable");
            Ok(())
        }
        Err(RetryError::Exhausted { attempts }) => {
            tracing::error!(attempts, "ComfyUI API did not become reachable");
            Err(JobError::EngineUnavailable { attempts })
        }
        Err(RetryError::Aborted(err)) => Err(err),
    }
}

/// Outputs payload: node id -> output slot -> descriptor(s).
pub type Outputs = serde_json::Map<String, serde_json::Value>;

/// Waits for a submitted prompt to finish.
pub struct CompletionPoller<'a> {
    api: &'a dyn EngineApi,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
    counting: PollCounting,
}

impl<'a> CompletionPoller<'a> {
    pub fn new(
        api: &'a dyn EngineApi,
        sleeper: &'a dyn Sleeper,
        policy: RetryPolicy,
        counting: PollCounting,
    ) -> Self {
        Self {
            api,
            sleeper,
            policy,
            counting,
        }
    }

    /// Poll until the prompt produces outputs or fails.
    pub async fn wait_for_outputs(&self, prompt_id: &str) -> Result<Outputs, JobError> {
        let api = self.api;
        let count_pending = self.counting == PollCounting::EveryProbe;

        tracing::info!(prompt_id, "Waiting for generation to complete");

        let result = retry_until(&self.policy, self.sleeper, |probe| async move {
            let mut history = match api.get_history(prompt_id).await {
                Ok(history) => history,
                Err(e) => return Attempt::Abort(JobError::PollTransport(e)),
            };

            match history.remove(prompt_id) {
                None => {
                    tracing::trace!(prompt_id, probe, "No history record yet");
                    Attempt::Retry { counted: true }
                }
                Some(entry) if entry.is_error() => {
                    Attempt::Abort(JobError::Generation(entry.diagnostic()))
                }
                Some(entry) if entry.has_outputs() => Attempt::Ready(entry.outputs),
                Some(_) => {
                    tracing::trace!(prompt_id, probe, "History record pending");
                    Attempt::Retry {
                        counted: count_pending,
                    }
                }
            }
        })
        .await;

        match result {
            Ok(outputs) => {
                tracing::info!(prompt_id, nodes = outputs.len(), "Generation complete");
                Ok(outputs)
            }
            Err(RetryError::Aborted(err)) => {
                tracing::error!(prompt_id, error = %err, "Generation failed");
                Err(err)
            }
            Err(RetryError::Exhausted { attempts }) => {
                tracing::error!(prompt_id, attempts, "Timed out waiting for generation");
                Err(JobError::PollTimeout { attempts })
            }
        }
    }
}
