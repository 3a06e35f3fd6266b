use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{BatchError, Result};

/// Reason text reported by a task that reaches its poison id
pub const REJECT_REASON: &str = "reject";

/// How a concurrent batch reconciles its tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Report the first failure as soon as it is observed
    FailFast,
    /// Wait for every task and report failures as data
    CollectAll,
}

impl Strategy {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::FailFast => "fail_fast",
            Strategy::CollectAll => "collect_all",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::FailFast
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delay function computing a task's simulated wait in milliseconds from its id
pub type DelayFn = Arc<dyn Fn(i64) -> u64 + Send + Sync>;

/// Simulated I/O wait of a task
#[derive(Clone)]
pub enum Delay {
    /// No suspension point; the task runs to its terminal state when started
    None,
    /// The same wait for every task
    Fixed(Duration),
    /// A wait computed from the task id
    Computed(DelayFn),
}

impl Delay {
    /// Fixed delay in milliseconds
    pub fn fixed_ms(ms: u64) -> Self {
        Delay::Fixed(Duration::from_millis(ms))
    }

    /// `base_ms - step_ms * id`, saturating at zero
    ///
    /// With a positive step, higher ids finish first.
    pub fn incremental(base_ms: u64, step_ms: u64) -> Self {
        let base = i64::try_from(base_ms).unwrap_or(i64::MAX);
        let step = i64::try_from(step_ms).unwrap_or(i64::MAX);
        Delay::from_fn(move |id| {
            let ms = base.saturating_sub(step.saturating_mul(id)).max(0);
            ms as u64
        })
    }

    /// Delay in whole milliseconds computed from the task id
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(i64) -> u64 + Send + Sync + 'static,
    {
        Delay::Computed(Arc::new(f))
    }

    /// The wait for task `id`, or `None` when the task never suspends
    pub fn for_task(&self, id: i64) -> Option<Duration> {
        match self {
            Delay::None => None,
            Delay::Fixed(duration) => Some(*duration),
            Delay::Computed(f) => Some(Duration::from_millis(f(id))),
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Delay::None
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::None => f.write_str("None"),
            Delay::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Delay::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

/// A single unit of simulated asynchronous work
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Task identifier, also the success value
    pub id: i64,
    /// Simulated wait before the task reaches its terminal state
    pub delay: Delay,
    /// Id that makes this task fail
    pub poison_id: Option<i64>,
}

impl TaskSpec {
    /// Task with no delay and no poison id
    pub fn new(id: i64) -> Self {
        Self {
            id,
            delay: Delay::None,
            poison_id: None,
        }
    }

    /// Set the simulated delay
    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    /// Set the poison id
    pub fn with_poison_id(mut self, poison_id: i64) -> Self {
        self.poison_id = Some(poison_id);
        self
    }

    /// Build one task per id, all sharing `delay` and `poison_id`
    pub fn batch<I>(ids: I, delay: Delay, poison_id: Option<i64>) -> Vec<TaskSpec>
    where
        I: IntoIterator<Item = i64>,
    {
        ids.into_iter()
            .map(|id| TaskSpec {
                id,
                delay: delay.clone(),
                poison_id,
            })
            .collect()
    }

    /// Whether this task is configured to fail
    pub fn is_poisoned(&self) -> bool {
        self.poison_id == Some(self.id)
    }
}

/// Failure of a single task
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("task {id} failed: {reason}")]
pub struct TaskFailure {
    /// Id of the failed task
    pub id: i64,
    /// Failure reason
    pub reason: String,
}

impl TaskFailure {
    /// Failure with an arbitrary reason
    pub fn new(id: i64, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }

    /// Failure of a task that reached its poison id
    pub fn reject(id: i64) -> Self {
        Self::new(id, REJECT_REASON)
    }
}

/// Terminal outcome of one task in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "RecordView")]
pub struct OutcomeRecord {
    /// Task id
    pub id: i64,
    /// Success value or failure
    pub outcome: std::result::Result<i64, TaskFailure>,
}

impl OutcomeRecord {
    /// Record a task outcome
    pub fn new(id: i64, outcome: std::result::Result<i64, TaskFailure>) -> Self {
        Self { id, outcome }
    }

    /// Whether the task succeeded
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Success value, if any
    pub fn value(&self) -> Option<i64> {
        self.outcome.as_ref().ok().copied()
    }

    /// Failure, if any
    pub fn failure(&self) -> Option<&TaskFailure> {
        self.outcome.as_ref().err()
    }
}

#[derive(Serialize)]
struct RecordView {
    id: i64,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<OutcomeRecord> for RecordView {
    fn from(record: OutcomeRecord) -> Self {
        match record.outcome {
            Ok(value) => RecordView {
                id: record.id,
                success: true,
                value: Some(value),
                error: None,
            },
            Err(failure) => RecordView {
                id: record.id,
                success: false,
                value: None,
                error: Some(failure.reason),
            },
        }
    }
}

/// Outcome records of a batch, in submission order
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Unique identifier of this batch run
    pub batch_id: Uuid,
    /// Strategy the batch ran under
    pub strategy: Strategy,
    /// One record per task, in submission order
    pub records: Vec<OutcomeRecord>,
    /// Wall time from batch start to the last observed record
    pub elapsed: Duration,
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Strategy used by [`crate::batch::BatchRunner::run`]
    pub strategy: Strategy,
    /// Poison id applied to tasks that carry none of their own
    pub poison_id: Option<i64>,
    /// Record Prometheus metrics for each task and batch
    pub record_metrics: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::FailFast,
            poison_id: None,
            record_metrics: true,
        }
    }
}

impl BatchConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(BatchError::from)
    }
}
