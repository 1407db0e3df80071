//! The three activities the migration workflow schedules: dispatch
//! a step to a migrator, update a candidate's stored status, and emit a
//! lifecycle event. All three are short calls to a port — they hand work
//! off and return, they never themselves wait out a step.

use std::sync::Arc;

use async_trait::async_trait;
use loom_durable::{Activity, ActivityContext, ActivityError};
use loom_notifier::{DispatchStepRequest, MigratorNotifier, NotifierError};
use serde::{Deserialize, Serialize};

impl From<NotifierError> for ActivityError {
    fn from(err: NotifierError) -> Self {
        if err.is_retryable() {
            ActivityError::retryable(err.to_string())
        } else {
            ActivityError::non_retryable(err.to_string())
        }
    }
}

/// Hands a `DispatchStepRequest` to the Migrator Notifier port.
pub struct DispatchStepActivity {
    notifier: Arc<dyn MigratorNotifier>,
}

impl DispatchStepActivity {
    pub fn new(notifier: Arc<dyn MigratorNotifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Activity for DispatchStepActivity {
    const TYPE: &'static str = "dispatch_step";
    type Input = DispatchStepRequest;
    type Output = ();

    async fn execute(&self, _ctx: &ActivityContext, input: Self::Input) -> Result<Self::Output, ActivityError> {
        self.notifier.dispatch_step(input).await?;
        Ok(())
    }
}

/// A store write the workflow performs directly, bypassing the Service —
/// the mirror image of `start`'s initial status write.
#[async_trait]
pub trait CandidateStatusWriter: Send + Sync {
    async fn set_candidate_status(
        &self,
        migration_id: &str,
        candidate_id: &str,
        status: loom_core::CandidateStatus,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCandidateStatusInput {
    pub migration_id: String,
    pub candidate_id: String,
    pub status: loom_core::CandidateStatus,
}

/// Resets a candidate's store-level status. Used by the deferred cleanup
/// block to release a candidate for re-execution after a
/// dispatch failure, an unretried failed step, or an external cancel.
pub struct UpdateCandidateStatusActivity {
    store: Arc<dyn CandidateStatusWriter>,
}

impl UpdateCandidateStatusActivity {
    pub fn new(store: Arc<dyn CandidateStatusWriter>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Activity for UpdateCandidateStatusActivity {
    const TYPE: &'static str = "update_candidate_status";
    type Input = UpdateCandidateStatusInput;
    type Output = ();

    async fn execute(&self, _ctx: &ActivityContext, input: Self::Input) -> Result<Self::Output, ActivityError> {
        self.store
            .set_candidate_status(&input.migration_id, &input.candidate_id, input.status)
            .await
            .map_err(ActivityError::from)
    }
}

/// What a lifecycle event records. `duration_ms` is measured
/// from the workflow's own deterministic clock, never wall time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub migration_id: String,
    pub candidate_id: String,
    pub kind: LifecycleEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    RunStarted,
    StepDispatched,
    StepCompleted,
    StepRetried,
    RunCompleted,
    RunCancelled,
}

/// Fire-and-forget persistence of a lifecycle event. Local
/// activity with a short timeout; failures are logged, not propagated,
/// since losing a lifecycle record must never fail a migration run.
#[async_trait]
pub trait LifecycleSink: Send + Sync {
    async fn record(&self, event: LifecycleEvent) -> anyhow::Result<()>;
}

pub struct EmitLifecycleEventActivity {
    sink: Arc<dyn LifecycleSink>,
}

impl EmitLifecycleEventActivity {
    pub fn new(sink: Arc<dyn LifecycleSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Activity for EmitLifecycleEventActivity {
    const TYPE: &'static str = "emit_lifecycle_event";
    type Input = LifecycleEvent;
    type Output = ();

    async fn execute(&self, _ctx: &ActivityContext, input: Self::Input) -> Result<Self::Output, ActivityError> {
        if let Err(err) = self.sink.record(input).await {
            tracing::warn!(%err, "failed to record lifecycle event, continuing");
        }
        Ok(())
    }
}

/// Default [`LifecycleSink`]: a structured log line, nothing more. Good
/// enough until an operator wants these shipped somewhere queryable.
pub struct TracingLifecycleSink;

#[async_trait]
impl LifecycleSink for TracingLifecycleSink {
    async fn record(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        tracing::info!(
            migration_id = %event.migration_id,
            candidate_id = %event.candidate_id,
            kind = ?event.kind,
            step_name = ?event.step_name,
            duration_ms = ?event.duration_ms,
            "lifecycle event"
        );
        Ok(())
    }
}
