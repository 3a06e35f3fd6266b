//! Batch Runner Implementation
//!
//! Runs a fixed batch of tasks with:
//! - One spawned tokio task per unit of work, all started up front
//! - Fail-fast joining that stops waiting at the first failure
//! - Collect-all joining that turns every failure into an outcome record
//! - Strictly sequential execution that halts at the first failure
//! - Structured logging and optional Prometheus metrics

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::batch::task::{self, TaskContext, TaskOutcome};
use crate::batch::{
    BatchConfig, BatchPlan, BatchResult, EventLog, OutcomeRecord, PlanMode, SharedCounter,
    Strategy, TaskFailure, TaskSpec,
};
use crate::metrics::{self, RunStatus};
use crate::{BatchError, Result};

/// Result of running a [`BatchPlan`]
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// A concurrent batch finished
    Batch(BatchResult),
    /// A sequential run finished; values in execution order
    Sequential(Vec<i64>),
}

/// Runner for concurrent and sequential batches
#[derive(Debug, Clone)]
pub struct BatchRunner {
    /// Strategy used by [`BatchRunner::run`]
    strategy: Strategy,
    /// Poison id applied to tasks without their own
    poison_id: Option<i64>,
    /// Counter incremented by each successful task
    counter: Option<SharedCounter>,
    /// Lifecycle log
    events: Option<EventLog>,
    /// Whether to record Prometheus metrics
    record_metrics: bool,
}

impl BatchRunner {
    /// Create a runner with default settings
    pub fn new() -> Self {
        Self::from_config(BatchConfig::default())
    }

    /// Create a runner from a configuration
    pub fn from_config(config: BatchConfig) -> Self {
        Self {
            strategy: config.strategy,
            poison_id: config.poison_id,
            counter: None,
            events: None,
            record_metrics: config.record_metrics,
        }
    }

    /// Set the strategy used by [`BatchRunner::run`]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set a batch-wide poison id
    pub fn with_poison_id(mut self, poison_id: i64) -> Self {
        self.poison_id = Some(poison_id);
        self
    }

    /// Attach a counter incremented by each successful task
    pub fn with_counter(mut self, counter: SharedCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Attach a lifecycle log
    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    /// Enable or disable metrics recording
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.record_metrics = enabled;
        self
    }

    /// Run a concurrent batch with the configured strategy
    pub async fn run(&self, tasks: Vec<TaskSpec>) -> Result<BatchResult> {
        self.run_batch(tasks, self.strategy).await
    }

    /// Run every task concurrently and reconcile with `strategy`
    ///
    /// Under [`Strategy::FailFast`] the first failure is returned as
    /// [`BatchError::Task`] while the remaining tasks keep running detached.
    /// Under [`Strategy::CollectAll`] every task is awaited and the result
    /// holds one record per task in submission order.
    #[instrument(skip(self, tasks), fields(task_count = tasks.len(), strategy = %strategy))]
    pub async fn run_batch(&self, tasks: Vec<TaskSpec>, strategy: Strategy) -> Result<BatchResult> {
        if tasks.is_empty() {
            warn!("Rejecting empty batch");
            return Err(BatchError::EmptyBatch);
        }

        let batch_id = Uuid::new_v4();
        let batch_start = Instant::now();
        let total_tasks = tasks.len();
        info!(batch_id = %batch_id, total_tasks = total_tasks, "Starting batch execution");

        // Pre-suspension work of every task runs here, in submission order
        let ctx = self.context();
        let handles: Vec<(i64, JoinHandle<TaskOutcome>)> = tasks
            .into_iter()
            .map(|spec| {
                let spec = self.apply_poison(spec);
                let id = spec.id;
                (id, tokio::spawn(task::start(spec, &ctx)))
            })
            .collect();
        debug!(batch_id = %batch_id, "All tasks started");

        let joined = match strategy {
            Strategy::FailFast => Self::join_fail_fast(handles).await,
            Strategy::CollectAll => Ok(Self::join_collect_all(handles).await),
        };

        let records = match joined {
            Ok(records) => records,
            Err(err) => {
                error!(
                    batch_id = %batch_id,
                    elapsed_ms = batch_start.elapsed().as_millis(),
                    error = %err,
                    "Batch failed fast"
                );
                self.record_batch(Some(strategy), RunStatus::Failure);
                return Err(err);
            }
        };

        let result = BatchResult {
            batch_id,
            strategy,
            records,
            elapsed: batch_start.elapsed(),
        };

        let failed = result.failure_count();
        let status = if failed == 0 {
            RunStatus::Success
        } else {
            RunStatus::Failure
        };
        self.record_batch(Some(strategy), status);

        info!(
            batch_id = %batch_id,
            total_tasks = total_tasks,
            succeeded = result.success_count(),
            failed = failed,
            batch_duration_ms = result.elapsed.as_millis(),
            "Batch execution completed"
        );

        Ok(result)
    }

    /// Run tasks one after another
    ///
    /// Each task starts only after the previous one reached its terminal
    /// state. The first failure is returned and no later task starts.
    #[instrument(skip(self, tasks), fields(task_count = tasks.len()))]
    pub async fn run_sequential(&self, tasks: Vec<TaskSpec>) -> Result<Vec<i64>> {
        if tasks.is_empty() {
            warn!("Rejecting empty sequential run");
            return Err(BatchError::EmptyBatch);
        }

        let run_start = Instant::now();
        let total_tasks = tasks.len();
        info!(total_tasks = total_tasks, "Starting sequential execution");

        let ctx = self.context();
        let mut values = Vec::with_capacity(total_tasks);

        for spec in tasks {
            let spec = self.apply_poison(spec);
            let outcome = match tokio::spawn(task::start(spec, &ctx)).await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    self.record_batch(None, RunStatus::Failure);
                    return Err(BatchError::Join(join_error));
                }
            };

            match outcome {
                Ok(value) => values.push(value),
                Err(failure) => {
                    error!(
                        task_id = failure.id,
                        completed = values.len(),
                        skipped = total_tasks - values.len() - 1,
                        "Sequential execution halted"
                    );
                    self.record_batch(None, RunStatus::Failure);
                    return Err(BatchError::Task(failure));
                }
            }
        }

        self.record_batch(None, RunStatus::Success);
        info!(
            total_tasks = total_tasks,
            duration_ms = run_start.elapsed().as_millis(),
            "Sequential execution completed"
        );

        Ok(values)
    }

    /// Build the tasks described by `plan` and run them in its mode
    pub async fn run_plan(&self, plan: &BatchPlan) -> Result<PlanOutcome> {
        let tasks = plan.tasks()?;
        match plan.mode {
            PlanMode::FailFast => self
                .run_batch(tasks, Strategy::FailFast)
                .await
                .map(PlanOutcome::Batch),
            PlanMode::CollectAll => self
                .run_batch(tasks, Strategy::CollectAll)
                .await
                .map(PlanOutcome::Batch),
            PlanMode::Sequential => self.run_sequential(tasks).await.map(PlanOutcome::Sequential),
        }
    }

    /// Wait until all tasks succeed or the first one fails
    ///
    /// Returning early drops the remaining join handles, which detaches the
    /// tasks without cancelling them.
    async fn join_fail_fast(handles: Vec<(i64, JoinHandle<TaskOutcome>)>) -> Result<Vec<OutcomeRecord>> {
        let mut slots: Vec<Option<OutcomeRecord>> = vec![None; handles.len()];

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .enumerate()
            .map(|(index, (id, handle))| async move { (index, id, handle.await) })
            .collect();

        while let Some((index, id, joined)) = pending.next().await {
            match joined? {
                Ok(value) => slots[index] = Some(OutcomeRecord::new(id, Ok(value))),
                Err(failure) => {
                    warn!(
                        task_id = failure.id,
                        still_running = pending.len(),
                        "First failure observed; detaching remaining tasks"
                    );
                    return Err(BatchError::Task(failure));
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Wait for every task, converting failures and panics into records
    async fn join_collect_all(handles: Vec<(i64, JoinHandle<TaskOutcome>)>) -> Vec<OutcomeRecord> {
        join_all(handles.into_iter().map(|(id, handle)| async move {
            match handle.await {
                Ok(outcome) => OutcomeRecord::new(id, outcome),
                Err(join_error) => {
                    error!(task_id = id, error = %join_error, "Task join error");
                    OutcomeRecord::new(
                        id,
                        Err(TaskFailure::new(id, format!("task panicked: {}", join_error))),
                    )
                }
            }
        }))
        .await
    }

    fn context(&self) -> TaskContext {
        TaskContext {
            counter: self.counter.clone(),
            events: self.events.clone(),
            record_metrics: self.record_metrics,
        }
    }

    fn apply_poison(&self, mut spec: TaskSpec) -> TaskSpec {
        if spec.poison_id.is_none() {
            spec.poison_id = self.poison_id;
        }
        spec
    }

    fn record_batch(&self, strategy: Option<Strategy>, status: RunStatus) {
        if self.record_metrics {
            metrics::record_batch(strategy, status);
        }
    }
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}
