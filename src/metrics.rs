//! Metrics collection for batch execution
//!
//! Provides Prometheus-compatible counters for task and batch outcomes and a
//! histogram of simulated task delays.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

use crate::batch::Strategy;
use crate::{BatchError, Result};

lazy_static! {
    /// Counter for terminal task outcomes
    static ref TASKS: IntCounterVec = register_int_counter_vec!(
        "batch_runner_tasks_total",
        "Total number of tasks that reached a terminal state",
        &["status"]
    ).unwrap();

    /// Counter for batch runs
    static ref BATCHES: IntCounterVec = register_int_counter_vec!(
        "batch_runner_batches_total",
        "Total number of batch runs",
        &["strategy", "status"]
    ).unwrap();

    /// Histogram for simulated task delays
    static ref TASK_DELAY: Histogram = register_histogram!(
        "batch_runner_task_delay_seconds",
        "Simulated delay of each task in seconds",
        vec![0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();
}

/// Outcome label for a finished task or batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Everything succeeded
    Success,
    /// At least one task failed
    Failure,
}

impl RunStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        }
    }
}

/// Record a task reaching its terminal state
pub fn record_task(status: RunStatus) {
    TASKS.with_label_values(&[status.as_str()]).inc();
}

/// Record a finished batch run; sequential runs use the `sequential` label
pub fn record_batch(strategy: Option<Strategy>, status: RunStatus) {
    let label = strategy.map(|s| s.as_str()).unwrap_or("sequential");
    BATCHES.with_label_values(&[label, status.as_str()]).inc();
}

/// Record a task's simulated delay
pub fn observe_delay(delay: Duration) {
    TASK_DELAY.observe(delay.as_secs_f64());
}

/// Number of tasks recorded with `status`
pub fn task_count(status: RunStatus) -> u64 {
    TASKS.with_label_values(&[status.as_str()]).get()
}

/// Number of batches recorded with `strategy` and `status`
pub fn batch_count(strategy: Option<Strategy>, status: RunStatus) -> u64 {
    let label = strategy.map(|s| s.as_str()).unwrap_or("sequential");
    BATCHES.with_label_values(&[label, status.as_str()]).get()
}

/// Export all registered metrics in Prometheus text format
pub fn export() -> Result<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| BatchError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| BatchError::Metrics(e.to_string()))
}
