//! Bounded retry combinator shared by both polling loops.
//!
//! [`retry_until`] repeatedly runs a probe, sleeping [`RetryPolicy::interval`]
//! between probes, until the probe resolves, aborts, or the number of
//! *counted* attempts reaches [`RetryPolicy::max_attempts`]. Sleeping goes
//! through the [`Sleeper`] seam so tests run without real delays.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RetryPolicy;

/// Suspends the current task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a single probe.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Done; stop with this value.
    Ready(T),
    /// Not yet; try again. `counted` decides whether this probe uses up
    /// part of the budget.
    Retry { counted: bool },
    /// Terminal failure; stop without further probes.
    Abort(E),
}

/// Why [`retry_until`] gave up.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The budget ran out after this many counted attempts.
    Exhausted { attempts: u32 },
    /// The probe reported a terminal failure.
    Aborted(E),
}

/// Run `probe` until it is ready, aborts, or the budget is exhausted.
///
/// The probe receives the 1-based probe number. No sleep happens after the
/// attempt that exhausts the budget.
pub async fn retry_until<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut probe: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let mut attempts = 0u32;
    let mut probes = 0u32;

    while attempts < policy.max_attempts {
        probes += 1;
        match probe(probes).await {
            Attempt::Ready(value) => return Ok(value),
            Attempt::Abort(err) => return Err(RetryError::Aborted(err)),
            Attempt::Retry { counted } => {
                if counted {
                    attempts += 1;
                }
            }
        }

        if attempts < policy.max_attempts {
            sleeper.sleep(policy.interval).await;
        }
    }

    Err(RetryError::Exhausted { attempts })
}
