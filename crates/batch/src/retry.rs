//! Retry policy implementation

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;

/// Delay before the first retry; doubled for every retry after it
pub const BASE_BACKOFF: Duration = Duration::from_millis(1000);

/// What to do after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The task succeeded
    TerminalSuccess,
    /// The task failed and will not be retried
    TerminalFailure,
    /// Sleep for the backoff delay and try again
    Retry,
}

impl Decision {
    /// Check if the task is finished
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Retry)
    }
}

/// Retry decisions for label tasks
///
/// Exponential backoff without jitter or cap: the delay after attempt `k`
/// (zero-based) is `1000 ms * 2^k`. The only bound is `retry_count`, which
/// limits a task to `retry_count + 1` attempts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use ulist_batch::RetryPolicy;
///
/// let policy = RetryPolicy::new(2);
///
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.backoff_delay(0), Duration::from_secs(1));
/// assert_eq!(policy.backoff_delay(1), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries per task (attempts = retries + 1)
    pub retry_count: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

impl RetryPolicy {
    /// Create a policy allowing `retry_count` retries per task
    pub fn new(retry_count: u32) -> Self {
        Self { retry_count }
    }

    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Total attempts a task may use
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Decide what follows an outcome of zero-based attempt `attempt`
    ///
    /// Terminal failures are never retried, whatever budget remains.
    pub fn classify(&self, outcome: &Outcome, attempt: u32) -> Decision {
        match outcome {
            Outcome::Success => Decision::TerminalSuccess,
            Outcome::TerminalFailure(_) => Decision::TerminalFailure,
            Outcome::RetryableFailure(_) if attempt < self.retry_count => Decision::Retry,
            Outcome::RetryableFailure(_) => Decision::TerminalFailure,
        }
    }

    /// Delay to wait after zero-based attempt `attempt` before the next one
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        BASE_BACKOFF.saturating_mul(factor)
    }
}
