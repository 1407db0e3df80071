//! The execution engine: registries plus the executor that drives
//! workflow instances and runs the activities they schedule.

mod activities;
mod executor;
mod registry;

pub use activities::{AnyActivity, ActivityRegistry};
pub use executor::{ExecutorConfig, ExecutorError, WorkflowExecutor, WorkflowOutcome};
pub use registry::{AnyWorkflow, RegistryError, WorkflowRegistry};
