//! Per-task and per-run results

use serde::{Deserialize, Serialize};

use crate::outcome::FailureReason;

/// Terminal record of one task
///
/// Exactly one exists for every task a worker took from the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Identifier of the item
    pub item_id: String,

    /// Whether the label change was applied
    pub succeeded: bool,

    /// Attempts made, including the first
    pub attempts_used: u32,

    /// Reason of the last failed attempt, for failed tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl TaskResult {
    /// Record a successful task
    pub fn success(item_id: impl Into<String>, attempts_used: u32) -> Self {
        Self {
            item_id: item_id.into(),
            succeeded: true,
            attempts_used,
            failure: None,
        }
    }

    /// Record a failed task
    pub fn failure(
        item_id: impl Into<String>,
        attempts_used: u32,
        reason: Option<FailureReason>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            succeeded: false,
            attempts_used,
            failure: reason,
        }
    }
}

/// Live counters of a running batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Items in the batch
    pub total: usize,

    /// Tasks that reached a terminal state
    pub completed: usize,

    /// Tasks that succeeded
    pub succeeded: usize,

    /// Tasks that failed
    pub failed: usize,
}

impl BatchProgress {
    /// Progress of a batch nothing has completed in yet
    pub fn start(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }
}

/// Summary of a finished batch run
///
/// `succeeded + failed + unprocessed == total` always holds. `failed` counts
/// items that were attempted and did not succeed; `unprocessed` counts items
/// no worker ever took, which only happens when the run was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    total: usize,
    succeeded: usize,
    failed: usize,
    unprocessed: usize,
    aborted: bool,
    task_results: Vec<TaskResult>,
}

impl BatchResult {
    /// Result of a run over no items
    pub fn empty() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            unprocessed: 0,
            aborted: false,
            task_results: Vec::new(),
        }
    }

    /// Build the summary from the results of every taken task
    pub(crate) fn from_task_results(
        total: usize,
        task_results: Vec<TaskResult>,
        aborted: bool,
    ) -> Self {
        let succeeded = task_results.iter().filter(|r| r.succeeded).count();
        let failed = task_results.len() - succeeded;
        Self {
            total,
            succeeded,
            failed,
            unprocessed: total.saturating_sub(succeeded + failed),
            aborted,
            task_results,
        }
    }

    /// Items in the batch
    pub fn total(&self) -> usize {
        self.total
    }

    /// Items whose label change was applied
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Items attempted without success
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Items never attempted
    pub fn unprocessed(&self) -> usize {
        self.unprocessed
    }

    /// Whether cancellation was requested during the run
    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Per-task records in completion order
    pub fn task_results(&self) -> &[TaskResult] {
        &self.task_results
    }

    /// Find the record of one item
    pub fn task_result(&self, item_id: &str) -> Option<&TaskResult> {
        self.task_results.iter().find(|r| r.item_id == item_id)
    }

    /// Records of failed tasks
    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.task_results.iter().filter(|r| !r.succeeded)
    }
}
