//! Items, label changes, and the remote operation contract

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A record the label change may be applied to
///
/// `labels` holds whatever label ids the caller already knows the record
/// carries. The batch engine never reads or mutates them; they exist so the
/// caller can pre-filter targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Opaque identifier passed to the remote operation
    pub id: String,

    /// Labels known to be present on the record
    #[serde(default)]
    pub labels: BTreeSet<u32>,
}

impl Item {
    /// Create an item with no known labels
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: BTreeSet::new(),
        }
    }

    /// Mark a label as known to be present
    pub fn with_label(mut self, label: u32) -> Self {
        self.labels.insert(label);
        self
    }

    /// Check if a label is known to be present
    pub fn has_label(&self, label: u32) -> bool {
        self.labels.contains(&label)
    }
}

/// Desired label state applied to every item of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelChange {
    /// Label id
    pub label: u32,

    /// `true` to add the label, `false` to remove it
    pub set: bool,
}

impl LabelChange {
    /// Add `label` to each item
    pub fn set(label: u32) -> Self {
        Self { label, set: true }
    }

    /// Remove `label` from each item
    pub fn unset(label: u32) -> Self {
        Self { label, set: false }
    }

    /// Check if an item is already known to be in the desired state
    pub fn is_applied_to(&self, item: &Item) -> bool {
        item.has_label(self.label) == self.set
    }
}

/// One pending application of the label change to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// The item this task labels
    pub item: Item,

    /// Zero-based attempt number; only ever incremented
    pub attempt: u32,
}

impl Task {
    /// Create a task for its first attempt
    pub fn new(item: Item) -> Self {
        Self { item, attempt: 0 }
    }
}

/// Why a remote call did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No credential available; no request was sent
    #[error("missing credential")]
    AuthMissing,

    /// Transport failure before a response arrived
    #[error("network error: {message}")]
    Network { message: String },

    /// Request exceeded the client's timeout
    #[error("request timed out")]
    Timeout,

    /// HTTP 429
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// HTTP 5xx
    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    /// Any other non-2xx status
    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// The remote operation panicked instead of returning an outcome
    #[error("labeler panicked: {message}")]
    Panicked { message: String },
}

impl FailureReason {
    /// Check if a later attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout | Self::RateLimited | Self::Server { .. }
        )
    }
}

/// Result of one remote call attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The remote record now has the desired label state
    Success,

    /// Transient failure; another attempt may succeed
    RetryableFailure(FailureReason),

    /// Failure that no retry will fix
    TerminalFailure(FailureReason),
}

impl Outcome {
    /// Wrap a failure reason in the variant its retryability implies
    pub fn failure(reason: FailureReason) -> Self {
        if reason.is_retryable() {
            Self::RetryableFailure(reason)
        } else {
            Self::TerminalFailure(reason)
        }
    }

    /// Classify an HTTP status code
    ///
    /// `2xx` is success, `429` and `5xx` are retryable, everything else is
    /// terminal. `body` is kept as the message of client errors.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            200..=299 => Self::Success,
            429 => Self::failure(FailureReason::RateLimited),
            500.. => Self::failure(FailureReason::Server { status }),
            _ => Self::failure(FailureReason::Client {
                status,
                message: body.into(),
            }),
        }
    }

    /// Check if this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Take the failure reason, if any
    pub fn into_reason(self) -> Option<FailureReason> {
        match self {
            Self::Success => None,
            Self::RetryableFailure(reason) | Self::TerminalFailure(reason) => Some(reason),
        }
    }
}

/// The remote operation a batch applies to each item
///
/// Implementations own transport, credentials, and request timeouts. They
/// are called concurrently from several workers and must never panic on
/// failure; every failure is reported through [`Outcome`].
///
/// # Example
///
/// ```ignore
/// struct AlwaysOk;
///
/// #[async_trait]
/// impl RemoteLabeler for AlwaysOk {
///     async fn apply(&self, _item_id: &str, _change: LabelChange, _attempt: u32) -> Outcome {
///         Outcome::Success
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteLabeler: Send + Sync + 'static {
    /// Apply `change` to the record identified by `item_id`
    ///
    /// `attempt` is zero-based and increases on every retry of the same item.
    async fn apply(&self, item_id: &str, change: LabelChange, attempt: u32) -> Outcome;
}
