//! # Batch Runner
//!
//! Concurrent execution of independent asynchronous tasks with explicit
//! reconciliation of partial success and failure.
//!
//! ## Overview
//!
//! A batch is a fixed, ordered set of [`batch::TaskSpec`]s. The
//! [`batch::BatchRunner`] starts every task at once and joins them with one of
//! two strategies, or runs them strictly one after another:
//!
//! - [`batch::Strategy::FailFast`]: return the first failure as soon as it is
//!   observed. Tasks already in flight are not cancelled and keep running.
//! - [`batch::Strategy::CollectAll`]: wait for every task and report each
//!   outcome as data.
//! - [`batch::BatchRunner::run_sequential`]: task *k+1* starts only once task
//!   *k* is terminal, and the first failure halts the run.
//!
//! ## Quick Start
//!
//! ```rust
//! use batch_runner::batch::{BatchRunner, Delay, SharedCounter, Strategy, TaskSpec};
//!
//! # async fn example() -> batch_runner::Result<()> {
//! let counter = SharedCounter::new();
//! let runner = BatchRunner::new().with_counter(counter.clone());
//!
//! let tasks = TaskSpec::batch(0..10, Delay::fixed_ms(10), Some(6));
//! let result = runner.run_batch(tasks, Strategy::CollectAll).await?;
//!
//! assert_eq!(result.failed_ids(), vec![6]);
//! assert_eq!(counter.value(), 9);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`batch`]: task model, runner and result reconciliation
//! - [`metrics`]: Prometheus counters for task and batch outcomes

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error;

/// Result type for batch runner operations
pub type Result<T> = std::result::Result<T, BatchError>;

/// Main error type for batch runner operations
#[derive(Error, Debug)]
pub enum BatchError {
    /// A task reached its poison id
    #[error("Task failure: {0}")]
    Task(#[from] batch::TaskFailure),

    /// A batch was submitted without any tasks
    #[error("Batch contains no tasks")]
    EmptyBatch,

    /// Join error from a spawned task
    #[error("Async join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Invalid configuration or batch plan
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registry or encoder error
    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl BatchError {
    /// The task failure carried by this error, if any
    pub fn task_failure(&self) -> Option<&batch::TaskFailure> {
        match self {
            BatchError::Task(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Batch task model, runner and reconciliation
pub mod batch;

/// Prometheus metrics for batch execution
pub mod metrics;
