//! The Execution Engine port: what `loom-service` sees
//! instead of `loom-durable`'s workflow-id strings and executor errors.
//!
//! Keeping this seam narrow is what let `loom-durable` stay a
//! domain-agnostic kernel: everything migration-specific (deriving a
//! workflow id from `migration_id`/`candidate_id`, naming signals,
//! shaping the snapshot) lives here and in [`crate::workflow`], not in
//! the kernel itself.

use std::sync::Arc;

use async_trait::async_trait;
use loom_core::identity::workflow_id;
use loom_core::IdentityError;
use loom_durable::{
    ExecutorError, WorkflowEventStore, WorkflowExecutor, WorkflowSignal, WorkflowStatus,
};
use loom_notifier::MigratorNotifier;
use serde_json::Value;
use thiserror::Error;

use crate::activities::{
    CandidateStatusWriter, DispatchStepActivity, EmitLifecycleEventActivity, LifecycleSink,
    UpdateCandidateStatusActivity,
};
use crate::workflow::{MigrationWorkflow, MigrationWorkflowInput, MigrationWorkflowOutput};

/// Terminal (or running) status of one candidate's run, independent of
/// `loom-durable`'s own `WorkflowStatus` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl From<WorkflowStatus> for RunStatus {
    fn from(status: WorkflowStatus) -> Self {
        match status {
            WorkflowStatus::Running => RunStatus::Running,
            WorkflowStatus::Completed => RunStatus::Completed,
            WorkflowStatus::Failed => RunStatus::Failed,
            WorkflowStatus::Cancelled => RunStatus::Cancelled,
        }
    }
}

/// What `getStatus`/`getCandidateSteps` need back from a run.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub status: RunStatus,
    pub output: Option<MigrationWorkflowOutput>,
    pub error: Option<String>,
    /// Live per-step state, taken from the workflow's own snapshot —
    /// reflects in-flight steps, not just the terminal output.
    pub snapshot: Option<Value>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("run not found for migration {migration_id:?} candidate {candidate_id:?}")]
    RunNotFound {
        migration_id: String,
        candidate_id: String,
    },

    #[error("run already in progress for migration {migration_id:?} candidate {candidate_id:?}")]
    AlreadyRunning {
        migration_id: String,
        candidate_id: String,
    },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("execution engine error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Starts, queries, signals, and cancels migration runs.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn start(
        &self,
        migration_id: &str,
        candidate_id: &str,
        input: MigrationWorkflowInput,
    ) -> Result<EngineStatus, EngineError>;

    async fn get_status(
        &self,
        migration_id: &str,
        candidate_id: &str,
    ) -> Result<EngineStatus, EngineError>;

    /// Deliver a named, deterministically-derived signal to a run —
    /// used for `step-completed`, `retry-step`, and
    /// `update-inputs`.
    async fn raise_event(
        &self,
        migration_id: &str,
        candidate_id: &str,
        signal_type: String,
        payload: Value,
    ) -> Result<(), EngineError>;

    async fn cancel(
        &self,
        migration_id: &str,
        candidate_id: &str,
        reason: String,
    ) -> Result<(), EngineError>;
}

/// `ExecutionEngine` backed by `loom-durable`'s `WorkflowExecutor`.
pub struct LoomExecutionEngine<S: WorkflowEventStore> {
    executor: WorkflowExecutor<S>,
}

impl<S: WorkflowEventStore> LoomExecutionEngine<S> {
    pub fn new(
        store: S,
        notifier: Arc<dyn MigratorNotifier>,
        candidate_status_writer: Arc<dyn CandidateStatusWriter>,
        lifecycle_sink: Arc<dyn LifecycleSink>,
    ) -> Self {
        let mut executor = WorkflowExecutor::new(store);
        executor.register_workflow::<MigrationWorkflow>();
        executor.register_activity(DispatchStepActivity::new(notifier));
        executor.register_activity(UpdateCandidateStatusActivity::new(candidate_status_writer));
        executor.register_activity(EmitLifecycleEventActivity::new(lifecycle_sink));
        Self { executor }
    }

    fn run_id(migration_id: &str, candidate_id: &str) -> Result<String, EngineError> {
        Ok(workflow_id(migration_id, candidate_id)?)
    }
}

fn map_not_found(
    error: ExecutorError,
    migration_id: &str,
    candidate_id: &str,
) -> EngineError {
    match error {
        ExecutorError::Store(loom_durable::StoreError::WorkflowNotFound(_))
        | ExecutorError::WorkflowCompleted(_) => EngineError::RunNotFound {
            migration_id: migration_id.to_string(),
            candidate_id: candidate_id.to_string(),
        },
        ExecutorError::Store(loom_durable::StoreError::AlreadyExists(_)) => {
            EngineError::AlreadyRunning {
                migration_id: migration_id.to_string(),
                candidate_id: candidate_id.to_string(),
            }
        }
        other => EngineError::Internal(other.into()),
    }
}

#[async_trait]
impl<S: WorkflowEventStore> ExecutionEngine for LoomExecutionEngine<S> {
    async fn start(
        &self,
        migration_id: &str,
        candidate_id: &str,
        input: MigrationWorkflowInput,
    ) -> Result<EngineStatus, EngineError> {
        let id = Self::run_id(migration_id, candidate_id)?;
        let outcome = self
            .executor
            .start_workflow::<MigrationWorkflow>(&id, input)
            .await
            .map_err(|e| map_not_found(e, migration_id, candidate_id))?;

        let output = outcome
            .result
            .and_then(|v| serde_json::from_value(v).ok());
        let snapshot = self.executor.query_snapshot(&id).await.ok().flatten();

        Ok(EngineStatus {
            status: outcome.status.into(),
            output,
            error: outcome.error.map(|e| e.message),
            snapshot,
        })
    }

    async fn get_status(
        &self,
        migration_id: &str,
        candidate_id: &str,
    ) -> Result<EngineStatus, EngineError> {
        let id = Self::run_id(migration_id, candidate_id)?;
        let info = self
            .executor
            .workflow_info(&id)
            .await
            .map_err(|e| map_not_found(e, migration_id, candidate_id))?;

        let output = info
            .result
            .clone()
            .and_then(|v| serde_json::from_value(v).ok());
        let snapshot = self.executor.query_snapshot(&id).await.ok().flatten();

        Ok(EngineStatus {
            status: info.status.into(),
            output,
            error: info.error.map(|e| e.message),
            snapshot,
        })
    }

    async fn raise_event(
        &self,
        migration_id: &str,
        candidate_id: &str,
        signal_type: String,
        payload: Value,
    ) -> Result<(), EngineError> {
        let id = Self::run_id(migration_id, candidate_id)?;
        self.executor
            .signal(&id, WorkflowSignal::new(signal_type, payload))
            .await
            .map_err(|e| map_not_found(e, migration_id, candidate_id))?;
        Ok(())
    }

    async fn cancel(
        &self,
        migration_id: &str,
        candidate_id: &str,
        reason: String,
    ) -> Result<(), EngineError> {
        let id = Self::run_id(migration_id, candidate_id)?;
        self.executor
            .cancel_workflow(&id, reason)
            .await
            .map_err(|e| map_not_found(e, migration_id, candidate_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loom_core::{Candidate, CandidateStatus};
    use loom_durable::InMemoryWorkflowEventStore;
    use loom_notifier::{DispatchStepRequest, NotifierError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct NoopNotifier {
        dispatched: Mutex<Vec<DispatchStepRequest>>,
    }

    #[async_trait]
    impl MigratorNotifier for NoopNotifier {
        async fn dispatch_step(&self, request: DispatchStepRequest) -> Result<(), NotifierError> {
            self.dispatched.lock().unwrap().push(request);
            Ok(())
        }
    }

    struct NoopStatusWriter {
        writes: Mutex<Vec<(String, String, CandidateStatus)>>,
    }

    #[async_trait]
    impl CandidateStatusWriter for NoopStatusWriter {
        async fn set_candidate_status(
            &self,
            migration_id: &str,
            candidate_id: &str,
            status: CandidateStatus,
        ) -> anyhow::Result<()> {
            self.writes
                .lock()
                .unwrap()
                .push((migration_id.to_string(), candidate_id.to_string(), status));
            Ok(())
        }
    }

    struct NoopSink;

    #[async_trait]
    impl LifecycleSink for NoopSink {
        async fn record(&self, _event: crate::activities::LifecycleEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn engine() -> LoomExecutionEngine<InMemoryWorkflowEventStore> {
        LoomExecutionEngine::new(
            InMemoryWorkflowEventStore::new(),
            Arc::new(NoopNotifier {
                dispatched: Mutex::new(Vec::new()),
            }),
            Arc::new(NoopStatusWriter {
                writes: Mutex::new(Vec::new()),
            }),
            Arc::new(NoopSink),
        )
    }

    fn input(steps: Vec<loom_core::migration::StepDefinition>) -> MigrationWorkflowInput {
        MigrationWorkflowInput {
            migration_id: "m1".to_string(),
            candidate: Candidate {
                id: "repo-a".to_string(),
                kind: "repo".to_string(),
                metadata: HashMap::new(),
                steps: None,
                file_groups: vec![],
                status: CandidateStatus::Running,
            },
            steps,
            migrator_url: "https://migrator.example".to_string(),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn start_with_no_steps_completes_immediately() {
        let engine = engine();
        let status = engine.start("m1", "repo-a", input(vec![])).await.unwrap();
        assert_eq!(status.status, RunStatus::Completed);
        assert!(status.output.is_some());
    }

    #[tokio::test]
    async fn get_status_before_start_is_run_not_found() {
        let engine = engine();
        let result = engine.get_status("m1", "repo-a").await;
        assert!(matches!(result, Err(EngineError::RunNotFound { .. })));
    }

    #[tokio::test]
    async fn raise_event_on_unknown_run_is_run_not_found() {
        let engine = engine();
        let result = engine
            .raise_event(
                "m1",
                "repo-a",
                "step-completed:build:repo-a".to_string(),
                serde_json::json!({"status": "succeeded"}),
            )
            .await;
        assert!(matches!(result, Err(EngineError::RunNotFound { .. })));
    }

    #[tokio::test]
    async fn cancel_running_workflow_reaches_cancelled_status() {
        let step = loom_core::migration::StepDefinition {
            name: "build".to_string(),
            migrator_app: "builder".to_string(),
            config: HashMap::new(),
            step_type: None,
        };
        let engine = engine();
        engine.start("m1", "repo-a", input(vec![step])).await.unwrap();

        engine
            .cancel("m1", "repo-a", "operator stop".to_string())
            .await
            .unwrap();

        let status = engine.get_status("m1", "repo-a").await.unwrap();
        assert_eq!(status.status, RunStatus::Cancelled);
    }
}
