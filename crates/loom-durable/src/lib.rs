//! # loom-durable
//!
//! A small, domain-agnostic durable workflow execution kernel: workflows
//! are deterministic state machines driven by replaying an append-only
//! event log, with activities as the one place non-determinism and I/O
//! are allowed to happen.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     WorkflowExecutor                         │
//! │   starts/signals workflows, replays their event log, and    │
//! │   runs any activity they schedule locally and synchronously │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   WorkflowEventStore                         │
//! │        append-only events + pending signals, per id          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike a distributed-worker-pool engine, there is no task queue,
//! dead letter queue, or worker registry here: `loom-engine` registers
//! a handful of short-lived activities (dispatch a step, update a
//! candidate's status, emit a lifecycle event) and the executor runs
//! them in-process, retrying per their `RetryPolicy` with real sleeps
//! between attempts.
//!
//! ## Example
//!
//! ```ignore
//! use loom_durable::prelude::*;
//!
//! struct MyWorkflow { done: bool }
//!
//! impl Workflow for MyWorkflow {
//!     const TYPE: &'static str = "my_workflow";
//!     type Input = serde_json::Value;
//!     type Output = serde_json::Value;
//!
//!     fn new(_input: Self::Input) -> Self {
//!         Self { done: false }
//!     }
//!
//!     fn on_start(&mut self) -> Vec<WorkflowAction> {
//!         vec![WorkflowAction::complete(serde_json::json!({}))]
//!     }
//!
//!     fn on_activity_completed(&mut self, _id: &str, _result: serde_json::Value) -> Vec<WorkflowAction> {
//!         vec![]
//!     }
//!
//!     fn on_activity_failed(&mut self, _id: &str, _error: &ActivityError) -> Vec<WorkflowAction> {
//!         vec![]
//!     }
//!
//!     fn is_completed(&self) -> bool { self.done }
//!     fn result(&self) -> Option<Self::Output> { self.done.then(|| serde_json::json!({})) }
//! }
//! ```

pub mod activity;
pub mod engine;
pub mod persistence;
pub mod reliability;
pub mod workflow;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::activity::{Activity, ActivityContext, ActivityError};
    pub use crate::engine::{
        ActivityRegistry, AnyWorkflow, ExecutorConfig, ExecutorError, WorkflowExecutor,
        WorkflowOutcome, WorkflowRegistry,
    };
    pub use crate::persistence::{InMemoryWorkflowEventStore, StoreError, WorkflowEventStore, WorkflowInfo, WorkflowStatus};
    pub use crate::reliability::{CircuitBreakerConfig, CircuitState, RetryPolicy};
    pub use crate::workflow::{
        signal_types, ActivityOptions, Workflow, WorkflowAction, WorkflowError, WorkflowEvent,
        WorkflowSignal,
    };
}

pub use activity::{Activity, ActivityContext, ActivityError};
pub use engine::{
    ActivityRegistry, AnyWorkflow, ExecutorConfig, ExecutorError, WorkflowExecutor, WorkflowOutcome,
    WorkflowRegistry,
};
pub use persistence::{InMemoryWorkflowEventStore, StoreError, WorkflowEventStore, WorkflowInfo, WorkflowStatus};
pub use reliability::{CircuitBreakerConfig, CircuitState, RetryPolicy};
pub use workflow::{
    signal_types, ActivityOptions, Workflow, WorkflowAction, WorkflowError, WorkflowEvent,
    WorkflowSignal,
};
