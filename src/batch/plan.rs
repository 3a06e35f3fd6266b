//! Declarative batch descriptions
//!
//! A plan names the task ids, their delay, an optional poison id and the
//! execution mode, and can be loaded from JSON:
//!
//! ```json
//! {
//!   "tasks": { "start": 0, "end": 10 },
//!   "delay": { "kind": "incremental", "base_ms": 1000, "step_ms": 50 },
//!   "poison_id": 6,
//!   "mode": "fail_fast"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::batch::{Delay, TaskSpec};
use crate::{BatchError, Result};

/// Largest number of tasks a plan may describe
pub const MAX_PLAN_TASKS: usize = 100_000;

/// Task ids of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskIds {
    /// Explicit ids, run in the given order
    List(Vec<i64>),
    /// Half-open range `start..end`
    Range {
        /// First id
        start: i64,
        /// One past the last id
        end: i64,
    },
}

impl TaskIds {
    /// Number of ids described
    pub fn count(&self) -> u128 {
        match self {
            TaskIds::List(ids) => ids.len() as u128,
            TaskIds::Range { start, end } => (*end as i128 - *start as i128).max(0) as u128,
        }
    }

    /// Ids in submission order
    pub fn to_vec(&self) -> Vec<i64> {
        match self {
            TaskIds::List(ids) => ids.clone(),
            TaskIds::Range { start, end } => (*start..*end).collect(),
        }
    }
}

/// Serializable description of a [`Delay`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayPlan {
    /// No suspension point
    #[default]
    None,
    /// Same delay for every task
    Fixed {
        /// Delay in milliseconds
        ms: u64,
    },
    /// `base_ms - step_ms * id`, saturating at zero
    Incremental {
        /// Delay of task 0 in milliseconds
        base_ms: u64,
        /// Reduction per id in milliseconds
        step_ms: u64,
    },
}

impl DelayPlan {
    /// Runtime delay for this description
    pub fn to_delay(&self) -> Delay {
        match self {
            DelayPlan::None => Delay::None,
            DelayPlan::Fixed { ms } => Delay::fixed_ms(*ms),
            DelayPlan::Incremental { base_ms, step_ms } => Delay::incremental(*base_ms, *step_ms),
        }
    }
}

/// How a plan is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    /// Concurrent, return on first failure
    #[default]
    FailFast,
    /// Concurrent, wait for every task
    CollectAll,
    /// One task at a time, halt on first failure
    Sequential,
}

/// A batch described as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    /// Task ids
    pub tasks: TaskIds,
    /// Delay shared by every task
    #[serde(default)]
    pub delay: DelayPlan,
    /// Id that fails
    #[serde(default)]
    pub poison_id: Option<i64>,
    /// Execution mode
    #[serde(default)]
    pub mode: PlanMode,
}

impl BatchPlan {
    /// Parse and validate a plan from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let plan: BatchPlan = serde_json::from_str(json)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Reject plans that describe no tasks
    pub fn validate(&self) -> Result<()> {
        match &self.tasks {
            TaskIds::List(ids) if ids.is_empty() => {
                Err(BatchError::Config("plan lists no task ids".to_string()))
            }
            TaskIds::Range { start, end } if end <= start => Err(BatchError::Config(format!(
                "plan range {}..{} is empty",
                start, end
            ))),
            tasks if tasks.count() > MAX_PLAN_TASKS as u128 => Err(BatchError::Config(format!(
                "plan describes {} tasks, more than the limit of {}",
                tasks.count(),
                MAX_PLAN_TASKS
            ))),
            _ => Ok(()),
        }
    }

    /// Task specs in submission order
    pub fn tasks(&self) -> Result<Vec<TaskSpec>> {
        self.validate()?;
        Ok(TaskSpec::batch(
            self.tasks.to_vec(),
            self.delay.to_delay(),
            self.poison_id,
        ))
    }
}
