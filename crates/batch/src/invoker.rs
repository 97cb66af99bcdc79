//! Retrying execution of a single task

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::cancel::CancellationToken;
use crate::outcome::{FailureReason, LabelChange, Outcome, RemoteLabeler, Task};
use crate::result::TaskResult;
use crate::retry::{Decision, RetryPolicy};

/// Runs one task to a terminal result
///
/// Failures never escape as errors: every task ends in a [`TaskResult`].
/// A panic inside the remote operation ends the task as a terminal
/// [`FailureReason::Panicked`] failure.
/// A retry that would start after cancellation was requested is abandoned
/// and the task is reported as failed with the reason of its last attempt.
pub struct RetryingInvoker {
    labeler: Arc<dyn RemoteLabeler>,
    policy: RetryPolicy,
    change: LabelChange,
    cancel: CancellationToken,
}

impl RetryingInvoker {
    /// Create an invoker applying `change` through `labeler`
    pub fn new(
        labeler: Arc<dyn RemoteLabeler>,
        policy: RetryPolicy,
        change: LabelChange,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            labeler,
            policy,
            change,
            cancel,
        }
    }

    /// Execute `task`, retrying transient failures with backoff
    pub async fn execute(&self, mut task: Task) -> TaskResult {
        loop {
            let outcome = self.attempt(&task).await;
            let attempts_used = task.attempt + 1;

            match self.policy.classify(&outcome, task.attempt) {
                Decision::TerminalSuccess => {
                    debug!(item_id = %task.item.id, attempts = attempts_used, "Label applied");
                    return TaskResult::success(task.item.id, attempts_used);
                }
                Decision::TerminalFailure => {
                    let reason = outcome.into_reason();
                    warn!(
                        item_id = %task.item.id,
                        attempts = attempts_used,
                        reason = ?reason,
                        "Label change failed"
                    );
                    return TaskResult::failure(task.item.id, attempts_used, reason);
                }
                Decision::Retry => {
                    let delay = self.policy.backoff_delay(task.attempt);
                    debug!(
                        item_id = %task.item.id,
                        attempt = task.attempt,
                        delay_ms = delay.as_millis() as u64,
                        outcome = ?outcome,
                        "Retrying after backoff"
                    );

                    if self.cancel.sleep(delay).await {
                        let reason = outcome.into_reason();
                        warn!(
                            item_id = %task.item.id,
                            attempts = attempts_used,
                            reason = ?reason,
                            "Retry abandoned after cancellation"
                        );
                        return TaskResult::failure(task.item.id, attempts_used, reason);
                    }

                    task.attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, task: &Task) -> Outcome {
        let call = self.labeler.apply(&task.item.id, self.change, task.attempt);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    item_id = %task.item.id,
                    attempt = task.attempt,
                    %message,
                    "Labeler panicked"
                );
                Outcome::TerminalFailure(FailureReason::Panicked { message })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;
    use crate::outcome::{FailureReason, Item, Outcome};

    /// Returns scripted outcomes in order, then successes
    struct Scripted {
        outcomes: Mutex<VecDeque<Outcome>>,
        calls: Mutex<Vec<(u32, Instant)>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RemoteLabeler for Scripted {
        async fn apply(&self, _item_id: &str, _change: LabelChange, attempt: u32) -> Outcome {
            self.calls.lock().push((attempt, Instant::now()));
            self.outcomes.lock().pop_front().unwrap_or(Outcome::Success)
        }
    }

    fn invoker(labeler: Arc<Scripted>, retry_count: u32, cancel: CancellationToken) -> RetryingInvoker {
        RetryingInvoker::new(labeler, RetryPolicy::new(retry_count), LabelChange::set(6), cancel)
    }

    struct Panicking;

    #[async_trait]
    impl RemoteLabeler for Panicking {
        async fn apply(&self, item_id: &str, _change: LabelChange, _attempt: u32) -> Outcome {
            panic!("no handler for {item_id}");
        }
    }

    fn rate_limited() -> Outcome {
        Outcome::RetryableFailure(FailureReason::RateLimited)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let labeler = Scripted::new(vec![]);
        let result = invoker(labeler.clone(), 2, CancellationToken::new())
            .execute(Task::new(Item::new("v1")))
            .await;

        assert_eq!(result, TaskResult::success("v1", 1));
        assert_eq!(labeler.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let labeler = Scripted::new(vec![rate_limited(), rate_limited()]);
        let result = invoker(labeler.clone(), 2, CancellationToken::new())
            .execute(Task::new(Item::new("v5")))
            .await;

        assert!(result.succeeded);
        assert_eq!(result.attempts_used, 3);

        let attempts: Vec<u32> = labeler.calls.lock().iter().map(|(a, _)| *a).collect();
        assert_eq!(attempts, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_between_attempts() {
        let labeler = Scripted::new(vec![rate_limited(), rate_limited()]);
        invoker(labeler.clone(), 2, CancellationToken::new())
            .execute(Task::new(Item::new("v5")))
            .await;

        let calls = labeler.calls.lock();
        let first_gap = calls[1].1 - calls[0].1;
        let second_gap = calls[2].1 - calls[1].1;
        assert!(first_gap >= Duration::from_millis(1000));
        assert!(first_gap < Duration::from_millis(1100));
        assert!(second_gap >= Duration::from_millis(2000));
        assert!(second_gap < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail() {
        let labeler = Scripted::new(vec![
            Outcome::RetryableFailure(FailureReason::Server { status: 502 }),
            Outcome::RetryableFailure(FailureReason::Server { status: 503 }),
        ]);
        let result = invoker(labeler.clone(), 1, CancellationToken::new())
            .execute(Task::new(Item::new("v2")))
            .await;

        assert!(!result.succeeded);
        assert_eq!(result.attempts_used, 2);
        assert_eq!(result.failure, Some(FailureReason::Server { status: 503 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_not_retried() {
        let labeler = Scripted::new(vec![Outcome::TerminalFailure(FailureReason::AuthMissing)]);
        let result = invoker(labeler.clone(), 5, CancellationToken::new())
            .execute(Task::new(Item::new("v3")))
            .await;

        assert_eq!(
            result,
            TaskResult::failure("v3", 1, Some(FailureReason::AuthMissing))
        );
        assert_eq!(labeler.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_abandons_retry() {
        let labeler = Scripted::new(vec![rate_limited(), rate_limited()]);
        let token = CancellationToken::new();
        let canceller = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = invoker(labeler.clone(), 2, token)
            .execute(Task::new(Item::new("v4")))
            .await;

        assert!(!result.succeeded);
        assert_eq!(result.attempts_used, 1);
        assert_eq!(result.failure, Some(FailureReason::RateLimited));
        assert_eq!(labeler.calls.lock().len(), 1);
        assert!(start.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_becomes_terminal_failure() {
        let invoker = RetryingInvoker::new(
            Arc::new(Panicking),
            RetryPolicy::new(3),
            LabelChange::set(6),
            CancellationToken::new(),
        );

        let result = invoker.execute(Task::new(Item::new("v4"))).await;

        assert_eq!(
            result,
            TaskResult::failure(
                "v4",
                1,
                Some(FailureReason::Panicked {
                    message: "no handler for v4".to_string()
                })
            )
        );
    }
}
