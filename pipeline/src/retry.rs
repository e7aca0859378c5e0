//! Retry Controller — bounded retries with connection backoff.
//!
//! Each item gets its own controller run. The state machine is:
//!
//! ```text
//! Attempting(1) ──ok──▶ Succeeded
//!      │ err, sleep(delay)
//!      ▼
//! Attempting(2) ──ok──▶ Succeeded
//!      ⋮
//! Attempting(max) ──err──▶ FailedFatal
//! ```
//!
//! The delay starts at the policy's initial value and is multiplied by the
//! backoff factor after every sleep that followed a connection-type error.
//! It never resets within one item and saturates at `MAX_RETRY_DELAY`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::RetryPolicy;
use crate::error::{FatalError, GenerationError};

/// Where a controller run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    /// The nth attempt (1-based) is in flight.
    Attempting(u32),
    /// An attempt returned a summary. Terminal.
    Succeeded,
    /// Every attempt failed. Terminal; aborts the run.
    FailedFatal,
}

impl RetryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedFatal)
    }
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempting(n) => write!(f, "Attempting({n})"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::FailedFatal => write!(f, "FailedFatal"),
        }
    }
}

/// A successful run: the value plus what it took to get it.
#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Attempt that succeeded (1-based).
    pub attempts: u32,
    /// Every delay slept, in order.
    pub delays: Vec<Duration>,
    /// States visited, ending in `Succeeded`.
    pub transitions: Vec<RetryState>,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `attempt` until it succeeds or the policy is exhausted.
    ///
    /// `attempt` is invoked at most `max_attempts` times. Exhaustion yields
    /// [`FatalError::RetriesExhausted`] carrying the last error.
    pub async fn run<T, F, Fut>(
        &self,
        item_id: u64,
        mut attempt: F,
    ) -> Result<RetryOutcome<T>, FatalError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.initial_delay();
        let mut delays = Vec::new();
        let mut transitions = Vec::new();
        let mut n = 1;

        loop {
            transitions.push(RetryState::Attempting(n));

            info!(item_id, attempt = n, max_attempts, "generating summary");
            match attempt(n).await {
                Ok(value) => {
                    transitions.push(RetryState::Succeeded);
                    info!(item_id, attempt = n, "summary generated");
                    return Ok(RetryOutcome {
                        value,
                        attempts: n,
                        delays,
                        transitions,
                    });
                }
                Err(err) if n < max_attempts => {
                    warn!(item_id, attempt = n, max_attempts, error = %err, "attempt failed");
                    info!(item_id, delay_secs = delay.as_secs_f64(), "retrying after delay");
                    tokio::time::sleep(delay).await;
                    delays.push(delay);
                    if err.is_connection_issue() {
                        delay = self.policy.next_delay(delay);
                    }
                    n += 1;
                }
                Err(err) => {
                    transitions.push(RetryState::FailedFatal);
                    error!(
                        item_id,
                        attempts = n,
                        error = %err,
                        "summary generation failed on every attempt, aborting run"
                    );
                    return Err(FatalError::RetriesExhausted {
                        item_id,
                        attempts: n,
                        last_error: err,
                    });
                }
            }
        }
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
