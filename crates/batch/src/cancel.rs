//! Cooperative cancellation for batch runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Longest uninterrupted sleep between cancellation checks
pub const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Shared stop flag for one batch run
///
/// Clones share the same flag. Once cancelled the token stays cancelled;
/// there is no way to reset it, so a fresh token is created per run.
///
/// Cancellation is cooperative: it is observed when a worker takes the next
/// task and at every sleep slice, never by interrupting a request that is
/// already in flight.
///
/// # Example
///
/// ```
/// use ulist_batch::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
///
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    ///
    /// Returns `true` if this call flipped the flag, `false` if the token was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for `duration` in slices of at most [`CANCEL_CHECK_SLICE`]
    ///
    /// Returns `true` if cancellation cut the sleep short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.sleep_until(Instant::now() + duration).await
    }

    /// Sleep until `deadline` in slices of at most [`CANCEL_CHECK_SLICE`]
    ///
    /// Returns `true` if cancellation cut the sleep short.
    pub async fn sleep_until(&self, deadline: Instant) -> bool {
        self.sleep_until_or(deadline, || false).await
    }

    /// Sleep until `deadline`, also ending once `stop` returns `true`
    ///
    /// `stop` is polled at every slice. Returns `true` if cancellation or
    /// `stop` cut the sleep short.
    pub async fn sleep_until_or(&self, deadline: Instant, stop: impl Fn() -> bool) -> bool {
        loop {
            if self.is_cancelled() || stop() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep((deadline - now).min(CANCEL_CHECK_SLICE)).await;
        }
    }
}
