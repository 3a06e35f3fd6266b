use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::{BatchResult, OutcomeRecord, Strategy, TaskFailure};
use crate::Result;

/// Serializable summary of a finished batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Batch identifier
    pub batch_id: Uuid,
    /// Strategy the batch ran under
    pub strategy: Strategy,
    /// Number of tasks in the batch
    pub total: usize,
    /// Number of successful tasks
    pub succeeded: usize,
    /// Number of failed tasks
    pub failed: usize,
    /// Ids of failed tasks, in submission order
    pub failed_ids: Vec<i64>,
    /// Percentage of successful tasks
    pub success_rate: f64,
    /// Batch duration in milliseconds
    pub elapsed_ms: u64,
}

impl BatchResult {
    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record for task `id`
    pub fn record(&self, id: i64) -> Option<&OutcomeRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Ids of successful tasks, in submission order
    pub fn successful_ids(&self) -> Vec<i64> {
        self.records
            .iter()
            .filter(|record| record.success())
            .map(|record| record.id)
            .collect()
    }

    /// Ids of failed tasks, in submission order
    pub fn failed_ids(&self) -> Vec<i64> {
        self.records
            .iter()
            .filter(|record| !record.success())
            .map(|record| record.id)
            .collect()
    }

    /// Failures, in submission order
    pub fn failures(&self) -> Vec<&TaskFailure> {
        self.records.iter().filter_map(OutcomeRecord::failure).collect()
    }

    /// Success values, in submission order
    pub fn values(&self) -> Vec<i64> {
        self.records.iter().filter_map(OutcomeRecord::value).collect()
    }

    /// Number of successful tasks
    pub fn success_count(&self) -> usize {
        self.records.iter().filter(|record| record.success()).count()
    }

    /// Number of failed tasks
    pub fn failure_count(&self) -> usize {
        self.records.len() - self.success_count()
    }

    /// Whether every task succeeded
    pub fn is_complete_success(&self) -> bool {
        self.records.iter().all(OutcomeRecord::success)
    }

    /// All success values, or the first failure in submission order
    pub fn into_first_failure(self) -> std::result::Result<Vec<i64>, TaskFailure> {
        self.records.into_iter().map(|record| record.outcome).collect()
    }

    /// Aggregate counts and failed ids
    pub fn summary(&self) -> BatchSummary {
        let total = self.records.len();
        let succeeded = self.success_count();
        let success_rate = if total > 0 {
            (succeeded as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        BatchSummary {
            batch_id: self.batch_id,
            strategy: self.strategy,
            total,
            succeeded,
            failed: total - succeeded,
            failed_ids: self.failed_ids(),
            success_rate,
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }

    /// Records and summary as a JSON document
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "summary": serde_json::to_value(self.summary())?,
            "records": serde_json::to_value(&self.records)?,
        }))
    }
}
