//! Per-worker request pacing

use std::time::Duration;

use tokio::time::Instant;

use crate::cancel::CancellationToken;

/// Enforces a minimum gap between one worker's successive requests
///
/// Each worker owns its own pacer, so with `C` workers the aggregate rate is
/// up to `C` requests per interval. Waiting happens in short slices so a
/// cancelled run stops pacing within [`CANCEL_CHECK_SLICE`].
///
/// [`CANCEL_CHECK_SLICE`]: crate::cancel::CANCEL_CHECK_SLICE
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    last_request: Option<Instant>,
    cancel: CancellationToken,
}

impl Pacer {
    /// Create a pacer for one worker
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            interval,
            last_request: None,
            cancel,
        }
    }

    /// Record that a request just completed
    pub fn mark_request(&mut self) {
        self.last_request = Some(Instant::now());
    }

    /// Minimum gap between requests
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `interval` has passed since the last completed request
    ///
    /// Returns immediately if no request was recorded yet. Returns `true` if
    /// cancellation cut the wait short.
    pub async fn wait_turn(&self) -> bool {
        self.wait_turn_unless(|| false).await
    }

    /// Like [`wait_turn`](Self::wait_turn), but give up the wait as soon as
    /// `done` returns `true`
    ///
    /// Returns `true` if cancellation or `done` cut the wait short.
    pub async fn wait_turn_unless(&self, done: impl Fn() -> bool) -> bool {
        match self.last_request {
            Some(last) => self.cancel.sleep_until_or(last + self.interval, done).await,
            None => self.cancel.is_cancelled() || done(),
        }
    }
}
