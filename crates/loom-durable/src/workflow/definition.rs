//! Workflow trait definition.

use serde::{de::DeserializeOwned, Serialize};

use super::{WorkflowAction, WorkflowSignal};
use crate::activity::ActivityError;

/// Error type for workflow failures.
#[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct WorkflowError {
    pub message: String,
    pub code: Option<String>,
    pub retryable: bool,
}

impl WorkflowError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: false,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WorkflowError {}

/// A workflow is a deterministic state machine driven by events.
///
/// Workflows must be deterministic: given the same sequence of events
/// they must produce the same sequence of actions, since recovery
/// replays the event log rather than resuming a live task.
pub trait Workflow: Send + Sync + 'static {
    /// Unique type identifier, used to look the workflow up in the
    /// registry during replay.
    const TYPE: &'static str;

    type Input: Serialize + DeserializeOwned + Send + Clone;
    type Output: Serialize + DeserializeOwned + Send;

    /// Construct a fresh instance from input. Called both to start a new
    /// workflow and, identically, to replay one from the beginning.
    fn new(input: Self::Input) -> Self;

    /// Called once, when the workflow starts (or replay reaches the
    /// beginning).
    fn on_start(&mut self) -> Vec<WorkflowAction>;

    fn on_activity_completed(
        &mut self,
        activity_id: &str,
        result: serde_json::Value,
    ) -> Vec<WorkflowAction>;

    fn on_activity_failed(
        &mut self,
        activity_id: &str,
        error: &ActivityError,
    ) -> Vec<WorkflowAction>;

    /// Called when an external signal is received.
    fn on_signal(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        let _ = signal;
        vec![]
    }

    fn is_completed(&self) -> bool;

    fn result(&self) -> Option<Self::Output>;

    fn error(&self) -> Option<WorkflowError> {
        None
    }

    /// A JSON snapshot of the workflow's current live state, used to back
    /// the execution engine's query handler (`getStatus(..).steps`).
    /// Workflows that have nothing to expose can
    /// leave this at its default.
    fn snapshot(&self) -> Option<serde_json::Value> {
        None
    }
}
