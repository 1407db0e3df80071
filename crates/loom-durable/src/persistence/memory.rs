//! In-memory implementation of `WorkflowEventStore`, for tests and for
//! single-process deployments that don't need durability across restarts.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::*;
use crate::workflow::{WorkflowError, WorkflowEvent, WorkflowSignal};

struct WorkflowState {
    workflow_type: String,
    status: WorkflowStatus,
    input: serde_json::Value,
    result: Option<serde_json::Value>,
    error: Option<WorkflowError>,
    events: Vec<WorkflowEvent>,
    signals: Vec<WorkflowSignal>,
}

/// # Example
///
/// ```
/// use loom_durable::InMemoryWorkflowEventStore;
///
/// let store = InMemoryWorkflowEventStore::new();
/// ```
pub struct InMemoryWorkflowEventStore {
    workflows: RwLock<HashMap<String, WorkflowState>>,
}

impl InMemoryWorkflowEventStore {
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.read().len()
    }
}

impl Default for InMemoryWorkflowEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowEventStore for InMemoryWorkflowEventStore {
    async fn create_workflow(
        &self,
        workflow_id: &str,
        workflow_type: &str,
        input: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write();
        if workflows.contains_key(workflow_id) {
            return Err(StoreError::AlreadyExists(workflow_id.to_string()));
        }

        workflows.insert(
            workflow_id.to_string(),
            WorkflowState {
                workflow_type: workflow_type.to_string(),
                status: WorkflowStatus::Running,
                input,
                result: None,
                error: None,
                events: vec![],
                signals: vec![],
            },
        );
        Ok(())
    }

    async fn start_or_restart_workflow(
        &self,
        workflow_id: &str,
        workflow_type: &str,
        input: serde_json::Value,
    ) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write();

        if let Some(existing) = workflows.get(workflow_id) {
            if !existing.status.is_terminal() {
                return Err(StoreError::AlreadyExists(workflow_id.to_string()));
            }
        }

        workflows.insert(
            workflow_id.to_string(),
            WorkflowState {
                workflow_type: workflow_type.to_string(),
                status: WorkflowStatus::Running,
                input,
                result: None,
                error: None,
                events: vec![],
                signals: vec![],
            },
        );
        Ok(())
    }

    async fn get_workflow_info(&self, workflow_id: &str) -> Result<WorkflowInfo, StoreError> {
        let workflows = self.workflows.read();
        let workflow = workflows
            .get(workflow_id)
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))?;

        Ok(WorkflowInfo {
            workflow_id: workflow_id.to_string(),
            workflow_type: workflow.workflow_type.clone(),
            status: workflow.status,
            input: workflow.input.clone(),
            result: workflow.result.clone(),
            error: workflow.error.clone(),
        })
    }

    async fn workflow_exists(&self, workflow_id: &str) -> Result<bool, StoreError> {
        Ok(self.workflows.read().contains_key(workflow_id))
    }

    async fn append_events(
        &self,
        workflow_id: &str,
        expected_sequence: i32,
        events: Vec<WorkflowEvent>,
    ) -> Result<i32, StoreError> {
        let mut workflows = self.workflows.write();
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))?;

        let current_sequence = workflow.events.len() as i32;
        if current_sequence != expected_sequence {
            return Err(StoreError::ConcurrencyConflict {
                expected: expected_sequence,
                actual: current_sequence,
            });
        }

        workflow.events.extend(events);
        Ok(workflow.events.len() as i32)
    }

    async fn load_events(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<(i32, WorkflowEvent)>, StoreError> {
        let workflows = self.workflows.read();
        let workflow = workflows
            .get(workflow_id)
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))?;

        Ok(workflow
            .events
            .iter()
            .enumerate()
            .map(|(i, e)| (i as i32, e.clone()))
            .collect())
    }

    async fn update_workflow_status(
        &self,
        workflow_id: &str,
        status: WorkflowStatus,
        result: Option<serde_json::Value>,
        error: Option<WorkflowError>,
    ) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write();
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))?;

        workflow.status = status;
        workflow.result = result;
        workflow.error = error;
        Ok(())
    }

    async fn send_signal(&self, workflow_id: &str, signal: WorkflowSignal) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write();
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))?;

        workflow.signals.push(signal);
        Ok(())
    }

    async fn take_pending_signals(&self, workflow_id: &str) -> Result<Vec<WorkflowSignal>, StoreError> {
        let mut workflows = self.workflows.write();
        let workflow = workflows
            .get_mut(workflow_id)
            .ok_or_else(|| StoreError::WorkflowNotFound(workflow_id.to_string()))?;

        Ok(std::mem::take(&mut workflow.signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get_workflow() {
        let store = InMemoryWorkflowEventStore::new();

        store
            .create_workflow("m::c", "migration_workflow", serde_json::json!({"key": "value"}))
            .await
            .unwrap();

        let info = store.get_workflow_info("m::c").await.unwrap();
        assert_eq!(info.status, WorkflowStatus::Running);
        assert_eq!(info.workflow_type, "migration_workflow");
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryWorkflowEventStore::new();
        store
            .create_workflow("m::c", "migration_workflow", serde_json::json!({}))
            .await
            .unwrap();

        let result = store
            .create_workflow("m::c", "migration_workflow", serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn append_and_load_events() {
        let store = InMemoryWorkflowEventStore::new();
        store
            .create_workflow("m::c", "test", serde_json::json!({}))
            .await
            .unwrap();

        let seq = store
            .append_events(
                "m::c",
                0,
                vec![WorkflowEvent::WorkflowStarted {
                    input: serde_json::json!({}),
                }],
            )
            .await
            .unwrap();
        assert_eq!(seq, 1);

        let events = store.load_events("m::c").await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn concurrency_conflict_on_stale_sequence() {
        let store = InMemoryWorkflowEventStore::new();
        store
            .create_workflow("m::c", "test", serde_json::json!({}))
            .await
            .unwrap();

        let result = store
            .append_events(
                "m::c",
                5,
                vec![WorkflowEvent::WorkflowStarted {
                    input: serde_json::json!({}),
                }],
            )
            .await;

        assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
    }

    #[tokio::test]
    async fn signals_are_queued_and_drained() {
        let store = InMemoryWorkflowEventStore::new();
        store
            .create_workflow("m::c", "test", serde_json::json!({}))
            .await
            .unwrap();

        store
            .send_signal("m::c", WorkflowSignal::cancel("user cancelled"))
            .await
            .unwrap();

        let signals = store.take_pending_signals("m::c").await.unwrap();
        assert_eq!(signals.len(), 1);

        let signals = store.take_pending_signals("m::c").await.unwrap();
        assert!(signals.is_empty());
    }
}
