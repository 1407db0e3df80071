//! `WorkflowEventStore` trait definition.
//!
//! Trimmed from a distributed-worker-pool store down to what a
//! locally-executing engine needs: workflow event append/replay and
//! signal delivery. No task queue, dead letter queue, worker registry,
//! or circuit breaker persistence — Loom's activities run synchronously
//! in the executor, so there is nothing to claim or heartbeat.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::workflow::{WorkflowEvent, WorkflowSignal};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("concurrency conflict: expected sequence {expected}, got {actual}")]
    ConcurrencyConflict { expected: i32, actual: i32 },

    #[error("workflow {0} already exists")]
    AlreadyExists(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Workflow information stored alongside its event log, kept separate
/// from the events themselves so status can be read without a replay.
#[derive(Debug, Clone)]
pub struct WorkflowInfo {
    pub workflow_id: String,
    pub workflow_type: String,
    pub status: WorkflowStatus,
    pub input: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<crate::workflow::WorkflowError>,
}

/// Store for workflow event logs and pending signals.
///
/// Implementations must be thread-safe; the executor shares one store
/// instance across concurrent workflow instances.
#[async_trait]
pub trait WorkflowEventStore: Send + Sync + 'static {
    /// Create a new workflow instance. Errors with `AlreadyExists` if
    /// `workflow_id` is already in use (identity is deterministic in
    /// Loom, so a caller retrying a request must detect this itself).
    async fn create_workflow(
        &self,
        workflow_id: &str,
        workflow_type: &str,
        input: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Start a workflow under `workflow_id`, reusing the id if a prior
    /// run under it has already reached a terminal status.
    ///
    /// Some callers derive workflow ids deterministically from stable
    /// domain identifiers rather than generating a fresh one per run
    /// (Loom: `migration_id ⨁ candidate_id`), so a later legitimate
    /// restart of the same logical unit of work collides with the id of
    /// its own finished history. Errors with `AlreadyExists` only when
    /// the existing run under this id is still non-terminal; a terminal
    /// run's history is discarded and replaced.
    async fn start_or_restart_workflow(
        &self,
        workflow_id: &str,
        workflow_type: &str,
        input: serde_json::Value,
    ) -> Result<(), StoreError>;

    async fn get_workflow_info(&self, workflow_id: &str) -> Result<WorkflowInfo, StoreError>;

    async fn workflow_exists(&self, workflow_id: &str) -> Result<bool, StoreError>;

    /// Append events to a workflow with optimistic concurrency.
    /// `expected_sequence` must equal the current event count.
    /// Returns the new sequence number.
    async fn append_events(
        &self,
        workflow_id: &str,
        expected_sequence: i32,
        events: Vec<WorkflowEvent>,
    ) -> Result<i32, StoreError>;

    /// Load all events for a workflow, in order, for replay.
    async fn load_events(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<(i32, WorkflowEvent)>, StoreError>;

    async fn update_workflow_status(
        &self,
        workflow_id: &str,
        status: WorkflowStatus,
        result: Option<serde_json::Value>,
        error: Option<crate::workflow::WorkflowError>,
    ) -> Result<(), StoreError>;

    /// Queue a signal for delivery on the workflow's next processing pass.
    async fn send_signal(
        &self,
        workflow_id: &str,
        signal: WorkflowSignal,
    ) -> Result<(), StoreError>;

    async fn take_pending_signals(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<WorkflowSignal>, StoreError>;
}
