//! The Execution Engine port and the migration workflow it drives.
//!
//! This crate owns the one seam where the domain (`loom-core`), the
//! domain-agnostic durable execution kernel (`loom-durable`), and the
//! outbound migrator ports (`loom-notifier`) all meet: the workflow
//! definition itself, its three activities, and a thin port
//! implementation that lets `loom-service` start/query/signal/cancel
//! runs without knowing any of that.

mod activities;
mod port;
mod workflow;

pub use activities::{
    CandidateStatusWriter, DispatchStepActivity, EmitLifecycleEventActivity, LifecycleEvent,
    LifecycleEventKind, LifecycleSink, TracingLifecycleSink, UpdateCandidateStatusActivity,
};
pub use port::{EngineError, EngineStatus, ExecutionEngine, LoomExecutionEngine, RunStatus};
pub use workflow::{MigrationWorkflow, MigrationWorkflowInput, MigrationWorkflowOutput};
