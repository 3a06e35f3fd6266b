/// Reconciliation helpers and batch summaries
pub mod aggregation;
/// Shared side-effect counter
pub mod counter;
/// Task lifecycle log
pub mod events;
/// Batch runner
pub mod executor;
/// Declarative batch descriptions
pub mod plan;
pub(crate) mod task;
/// Task, outcome and configuration types
pub mod types;

pub use aggregation::*;
pub use counter::*;
pub use events::*;
pub use executor::*;
pub use plan::*;
pub use types::*;
