//! # Batch Label Engine
//!
//! Applies one label change (set or unset a label on a remote record) to a
//! batch of items through an injected remote operation.
//!
//! ## Features
//!
//! - **Bounded concurrency**: a fixed pool of 1-5 workers; never more requests in flight
//! - **Retries**: transient failures retried with exponential backoff (1 s, 2 s, 4 s, ...)
//! - **Pacing**: a minimum gap between each worker's successive requests
//! - **Cooperative cancellation**: a stop request halts dispensing; in-flight work finishes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        BatchRunner                           │
//! │  (spawns workers, aggregates BatchResult, publishes progress)│
//! └─────────────────────────────────────────────────────────────┘
//!          │                                      ▲
//!          ▼                                      │ record
//! ┌──────────────────┐   take_next   ┌─────────────────────────┐
//! │    TaskQueue     │◄──────────────│  Worker 1 .. Worker N   │
//! │ (atomic cursor)  │               │  (RetryingInvoker+Pacer)│
//! └──────────────────┘               └─────────────────────────┘
//!          ▲                                      │
//!          │           CancellationToken          ▼
//!          └──────────── checked at take, ── RemoteLabeler::apply
//!                        backoff and pacing
//! ```
//!
//! The engine performs no I/O itself. Transport, credentials, and request
//! timeouts belong to the [`RemoteLabeler`] implementation.

pub mod cancel;
pub mod config;
pub mod invoker;
pub mod outcome;
pub mod pacer;
pub mod queue;
pub mod result;
pub mod retry;
pub mod runner;
pub mod settings;

/// Prelude for common imports
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::config::{BatchConfig, ConfigError};
    pub use crate::outcome::{FailureReason, Item, LabelChange, Outcome, RemoteLabeler};
    pub use crate::result::{BatchProgress, BatchResult, TaskResult};
    pub use crate::runner::BatchRunner;
    pub use crate::settings::Settings;
}

// Re-export key types at crate root
pub use cancel::CancellationToken;
pub use config::{BatchConfig, ConfigError};
pub use invoker::RetryingInvoker;
pub use outcome::{FailureReason, Item, LabelChange, Outcome, RemoteLabeler, Task};
pub use pacer::Pacer;
pub use queue::TaskQueue;
pub use result::{BatchProgress, BatchResult, TaskResult};
pub use retry::{Decision, RetryPolicy};
pub use runner::BatchRunner;
pub use settings::Settings;
