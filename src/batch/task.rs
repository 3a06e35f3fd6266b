//! Task body
//!
//! A task runs in two phases. [`start`] performs the pre-suspension work
//! synchronously: it logs the start, computes the delay and arms the timer.
//! The returned future holds the single suspension point and the terminal
//! work that follows it. A task with no delay finishes inside [`start`].

use std::panic::{self, AssertUnwindSafe};

use futures::future::{self, BoxFuture, FutureExt};
use tracing::{debug, error, warn};

use crate::batch::{EventLog, SharedCounter, TaskEventKind, TaskFailure, TaskSpec};
use crate::metrics::{self, RunStatus};

pub(crate) type TaskOutcome = std::result::Result<i64, TaskFailure>;

/// Handles shared by every task of a run
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskContext {
    pub counter: Option<SharedCounter>,
    pub events: Option<EventLog>,
    pub record_metrics: bool,
}

impl TaskContext {
    fn record(&self, id: i64, kind: TaskEventKind) {
        if let Some(events) = &self.events {
            events.record(id, kind);
        }
    }
}

/// Begin a task and return the remainder of its work
pub(crate) fn start(spec: TaskSpec, ctx: &TaskContext) -> BoxFuture<'static, TaskOutcome> {
    debug!(task_id = spec.id, "Task starting");
    ctx.record(spec.id, TaskEventKind::Started);

    // A panicking delay function must fail this task, not the whole runner
    let delay = match panic::catch_unwind(AssertUnwindSafe(|| spec.delay.for_task(spec.id))) {
        Ok(delay) => delay,
        Err(payload) => {
            error!(task_id = spec.id, "Delay function panicked");
            return future::lazy(move |_| -> TaskOutcome { panic::resume_unwind(payload) }).boxed();
        }
    };

    match delay {
        None => future::ready(finish(&spec, ctx)).boxed(),
        Some(delay) => {
            if ctx.record_metrics {
                metrics::observe_delay(delay);
            }
            // The deadline is fixed here, not when the future is first polled
            let sleep = tokio::time::sleep(delay);
            let ctx = ctx.clone();
            async move {
                sleep.await;
                finish(&spec, &ctx)
            }
            .boxed()
        }
    }
}

fn finish(spec: &TaskSpec, ctx: &TaskContext) -> TaskOutcome {
    if spec.is_poisoned() {
        warn!(task_id = spec.id, "Task rejected at poison id");
        ctx.record(spec.id, TaskEventKind::Failed);
        if ctx.record_metrics {
            metrics::record_task(RunStatus::Failure);
        }
        return Err(TaskFailure::reject(spec.id));
    }

    if let Some(counter) = &ctx.counter {
        counter.increment();
    }
    ctx.record(spec.id, TaskEventKind::Succeeded);
    if ctx.record_metrics {
        metrics::record_task(RunStatus::Success);
    }
    debug!(task_id = spec.id, "Task done");
    Ok(spec.id)
}
