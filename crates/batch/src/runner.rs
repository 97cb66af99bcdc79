//! Batch runner
//!
//! Drains one queue of items with a fixed number of concurrent workers.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::cancel::CancellationToken;
use crate::config::BatchConfig;
use crate::invoker::RetryingInvoker;
use crate::outcome::{Item, LabelChange, RemoteLabeler};
use crate::pacer::Pacer;
use crate::queue::TaskQueue;
use crate::result::{BatchProgress, BatchResult, TaskResult};

/// Applies a label change to a batch of items
///
/// Each call to [`run`](Self::run) spawns exactly `config.concurrency()`
/// workers. A worker repeatedly takes the next item, executes it with
/// retries, records the result, and waits for its pacing interval, until the
/// queue is drained or the run is cancelled. Items already taken when
/// cancellation arrives run to completion; items never taken are reported as
/// unprocessed.
///
/// # Example
///
/// ```ignore
/// use ulist_batch::{BatchConfig, BatchRunner, CancellationToken, Item, LabelChange};
///
/// let runner = BatchRunner::new(labeler, BatchConfig::default());
/// let cancel = CancellationToken::new();
///
/// // Hand `cancel.clone()` to whatever handles the operator's stop action
/// let result = runner
///     .run(vec![Item::new("v17"), Item::new("v11")], LabelChange::set(6), &cancel)
///     .await;
///
/// println!("{} succeeded, {} failed", result.succeeded(), result.failed());
/// ```
pub struct BatchRunner {
    labeler: Arc<dyn RemoteLabeler>,
    config: BatchConfig,
    progress_tx: watch::Sender<BatchProgress>,
}

impl BatchRunner {
    /// Create a runner calling `labeler` for every item
    pub fn new(labeler: Arc<dyn RemoteLabeler>, config: BatchConfig) -> Self {
        let (progress_tx, _) = watch::channel(BatchProgress::default());
        Self {
            labeler,
            config,
            progress_tx,
        }
    }

    /// Configuration used for every run
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Watch progress of the current or most recent run
    ///
    /// A new snapshot is published when a run starts and after every task
    /// reaches a terminal state.
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    /// Apply `change` to every item and summarize the outcome
    ///
    /// Item failures never make this fail. An empty `items` list returns a
    /// zero-filled result without spawning workers.
    #[instrument(
        skip_all,
        fields(total = items.len(), label = change.label, set = change.set)
    )]
    pub async fn run(
        &self,
        items: Vec<Item>,
        change: LabelChange,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let total = items.len();
        self.progress_tx.send_replace(BatchProgress::start(total));

        if items.is_empty() {
            debug!("No items to process");
            return BatchResult::empty();
        }

        info!(
            total,
            concurrency = self.config.concurrency(),
            interval_ms = self.config.interval().as_millis() as u64,
            retry_count = self.config.retry_count(),
            "Starting batch"
        );

        let queue = Arc::new(TaskQueue::new(items, cancel.clone()));
        let invoker = Arc::new(RetryingInvoker::new(
            Arc::clone(&self.labeler),
            self.config.retry_policy(),
            change,
            cancel.clone(),
        ));
        let tally = Arc::new(BatchTally::new(total, self.progress_tx.clone()));

        let handles: Vec<_> = (0..self.config.concurrency())
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let invoker = Arc::clone(&invoker);
                let tally = Arc::clone(&tally);
                let pacer = Pacer::new(self.config.interval(), cancel.clone());
                tokio::spawn(run_worker(worker, queue, invoker, tally, pacer))
            })
            .collect();

        for (worker, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!(worker, "Worker terminated abnormally: {}", e);
            }
        }

        let result = BatchResult::from_task_results(total, tally.into_results(), cancel.is_cancelled());

        info!(
            succeeded = result.succeeded(),
            failed = result.failed(),
            unprocessed = result.unprocessed(),
            aborted = result.aborted(),
            "Batch finished"
        );

        result
    }
}

/// Worker loop: take, execute, record, pace
async fn run_worker(
    worker: usize,
    queue: Arc<TaskQueue>,
    invoker: Arc<RetryingInvoker>,
    tally: Arc<BatchTally>,
    mut pacer: Pacer,
) {
    debug!(worker, "Worker started");

    while let Some(task) = queue.take_next() {
        let result = invoker.execute(task).await;
        pacer.mark_request();
        tally.record(result);

        // No trailing wait once nothing is left to take
        if queue.is_drained() {
            break;
        }

        // A peer may take the last item while this worker is pacing
        if pacer.wait_turn_unless(|| queue.is_drained()).await {
            debug!(worker, "Pacing cut short");
        }
    }

    debug!(worker, "Worker exited");
}

/// Shared result collection for one run
///
/// Workers only ever call [`record`](Self::record); the counters and the
/// published progress change together under one lock.
struct BatchTally {
    state: Mutex<TallyState>,
    progress_tx: watch::Sender<BatchProgress>,
}

struct TallyState {
    progress: BatchProgress,
    results: Vec<TaskResult>,
}

impl BatchTally {
    fn new(total: usize, progress_tx: watch::Sender<BatchProgress>) -> Self {
        Self {
            state: Mutex::new(TallyState {
                progress: BatchProgress::start(total),
                results: Vec::with_capacity(total),
            }),
            progress_tx,
        }
    }

    fn record(&self, result: TaskResult) {
        let mut state = self.state.lock();
        state.progress.completed += 1;
        if result.succeeded {
            state.progress.succeeded += 1;
        } else {
            state.progress.failed += 1;
        }
        state.results.push(result);
        self.progress_tx.send_replace(state.progress);
    }

    fn into_results(self: Arc<Self>) -> Vec<TaskResult> {
        match Arc::try_unwrap(self) {
            Ok(tally) => tally.state.into_inner().results,
            Err(shared) => shared.state.lock().results.clone(),
        }
    }
}
