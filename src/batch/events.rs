//! Task lifecycle log
//!
//! Every task records when it starts and when it reaches its terminal state.
//! Elapsed times are measured on the tokio clock, so they follow virtual time
//! in paused-clock tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Lifecycle stage of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    /// Pre-suspension work began
    Started,
    /// Task produced its value
    Succeeded,
    /// Task reached its poison id
    Failed,
}

impl TaskEventKind {
    /// Whether this stage is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskEventKind::Started)
    }
}

/// One entry in the lifecycle log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Task id
    pub id: i64,
    /// Lifecycle stage
    pub kind: TaskEventKind,
    /// Wall-clock time of the event
    pub at: DateTime<Utc>,
    /// Time since the log was created
    pub elapsed: Duration,
}

#[derive(Debug)]
struct EventLogInner {
    origin: Instant,
    events: Mutex<Vec<TaskEvent>>,
}

/// Shared, append-only log of task events
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

impl EventLog {
    /// Empty log whose elapsed times start now
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventLogInner {
                origin: Instant::now(),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append an event
    pub fn record(&self, id: i64, kind: TaskEventKind) {
        let event = TaskEvent {
            id,
            kind,
            at: Utc::now(),
            elapsed: self.inner.origin.elapsed(),
        };
        self.inner.events.lock().push(event);
    }

    /// Snapshot of all events in recording order
    pub fn events(&self) -> Vec<TaskEvent> {
        self.inner.events.lock().clone()
    }

    /// Ids of events of `kind`, in recording order
    pub fn ids_of(&self, kind: TaskEventKind) -> Vec<i64> {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|event| event.kind == kind)
            .map(|event| event.id)
            .collect()
    }

    /// Ids of tasks that started, in start order
    pub fn started_ids(&self) -> Vec<i64> {
        self.ids_of(TaskEventKind::Started)
    }

    /// Ids of tasks that reached a terminal state, in completion order
    pub fn terminal_ids(&self) -> Vec<i64> {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|event| event.kind.is_terminal())
            .map(|event| event.id)
            .collect()
    }

    /// Position of the first event matching `id` and `kind`
    pub fn position(&self, id: i64, kind: TaskEventKind) -> Option<usize> {
        self.inner
            .events
            .lock()
            .iter()
            .position(|event| event.id == id && event.kind == kind)
    }

    /// First event matching `id` and `kind`
    pub fn find(&self, id: i64, kind: TaskEventKind) -> Option<TaskEvent> {
        self.inner
            .events
            .lock()
            .iter()
            .find(|event| event.id == id && event.kind == kind)
            .cloned()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.inner.events.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all events; the origin is kept
    pub fn clear(&self) {
        self.inner.events.lock().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
