//! The ten migration use cases, composing the Store, the
//! Execution Engine, and the Migrator Notifier's Dry-Run port. Nothing
//! below this module knows about HTTP; `loom-api` is the only caller.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use loom_core::identity::{retry_step_event, update_inputs_event, workflow_id};
use loom_core::{Candidate, CandidateStatus, Migration, ServiceError, StepState, StepStatusEvent};
use loom_engine::{EngineError, EngineStatus, ExecutionEngine, MigrationWorkflowInput, RunStatus};
use loom_notifier::{DryRunError, DryRunPort, DryRunRequest, DryRunResult};
use loom_store::{Store, StoreError};

/// The status half of `getCandidateSteps`'s response: the fine-grained
/// `RunStatus` the engine tracks collapses to these two
/// values once it leaves the Service, since callers only ever care
/// whether a run is still going or has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRunStatus {
    Running,
    Completed,
}

impl From<RunStatus> for CandidateRunStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Running => CandidateRunStatus::Running,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled => {
                CandidateRunStatus::Completed
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CandidateStepsView {
    pub status: CandidateRunStatus,
    pub steps: Vec<StepState>,
}

fn instance_id(migration_id: &str, candidate_id: &str) -> String {
    workflow_id(migration_id, candidate_id)
        .unwrap_or_else(|_| format!("{migration_id}::{candidate_id}"))
}

fn map_store_error(err: StoreError) -> ServiceError {
    match err {
        StoreError::MigrationNotFound(id) => ServiceError::migration_not_found(id),
        StoreError::CandidateNotFound {
            migration_id,
            candidate_id,
        } => ServiceError::candidate_not_found(migration_id, candidate_id),
        StoreError::Transient(msg) => ServiceError::transient(msg),
    }
}

fn map_engine_error(err: EngineError) -> ServiceError {
    match err {
        EngineError::RunNotFound {
            migration_id,
            candidate_id,
        } => ServiceError::run_not_found(instance_id(&migration_id, &candidate_id)),
        EngineError::AlreadyRunning { candidate_id, .. } => {
            ServiceError::candidate_already_run(candidate_id, "running")
        }
        EngineError::Identity(e) => ServiceError::Identity(e),
        EngineError::Internal(e) => ServiceError::Internal(e),
    }
}

fn map_dry_run_error(err: DryRunError) -> ServiceError {
    match err {
        DryRunError::Transient(msg) => ServiceError::transient(msg),
        DryRunError::NoDispatchableMigrator | DryRunError::Rejected(_) => {
            ServiceError::Internal(anyhow::anyhow!(err))
        }
    }
}

/// Composes the three ports into the Service use cases.
pub struct Service {
    store: Arc<dyn Store>,
    engine: Arc<dyn ExecutionEngine>,
    dry_run: Arc<dyn DryRunPort>,
    reserved_migrators: HashSet<String>,
}

impl Service {
    pub fn new(
        store: Arc<dyn Store>,
        engine: Arc<dyn ExecutionEngine>,
        dry_run: Arc<dyn DryRunPort>,
        reserved_migrators: HashSet<String>,
    ) -> Self {
        Self {
            store,
            engine,
            dry_run,
            reserved_migrators,
        }
    }

    async fn require_migration(&self, migration_id: &str) -> Result<Migration, ServiceError> {
        self.store
            .get(migration_id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| ServiceError::migration_not_found(migration_id))
    }

    async fn require_candidate(&self, migration_id: &str, candidate_id: &str) -> Result<Candidate, ServiceError> {
        let migration = self.require_migration(migration_id).await?;
        migration
            .candidate(candidate_id)
            .cloned()
            .ok_or_else(|| ServiceError::candidate_not_found(migration_id, candidate_id))
    }

    /// Fetch a single migration by id.
    pub async fn get_migration(&self, migration_id: &str) -> Result<Migration, ServiceError> {
        self.require_migration(migration_id).await
    }

    /// List every announced migration.
    pub async fn list_migrations(&self) -> Result<Vec<Migration>, ServiceError> {
        self.store.list().await.map_err(map_store_error)
    }

    /// Upsert a migration, preserving its `created_at` and candidate set
    /// across re-announcements.
    pub async fn announce(&self, incoming: Migration) -> Result<Migration, ServiceError> {
        let merged = match self.store.get(&incoming.id).await.map_err(map_store_error)? {
            Some(mut existing) => {
                existing.apply_announcement(incoming);
                existing
            }
            None => incoming,
        };
        self.store.save(merged.clone()).await.map_err(map_store_error)?;
        Ok(merged)
    }

    /// Replace a migration's candidate set wholesale (the new
    /// `submitCandidates`).
    pub async fn submit_candidates(&self, migration_id: &str, candidates: Vec<Candidate>) -> Result<(), ServiceError> {
        self.require_migration(migration_id).await?;
        self.store
            .save_candidates(migration_id, candidates)
            .await
            .map_err(map_store_error)
    }

    /// Enriched candidates for a migration: the primary reconciliation
    /// point exposed to readers (§4.5). Every candidate stored `running`
    /// is cross-checked against the engine; a `RunNotFound` means the
    /// workflow instance is gone, so the Store is healed back to
    /// `not_started` before the candidate is returned. Other engine
    /// errors leave the stored entry untouched.
    pub async fn get_candidates(&self, migration_id: &str) -> Result<Vec<Candidate>, ServiceError> {
        let mut candidates = self.store.get_candidates(migration_id).await.map_err(map_store_error)?;

        for candidate in candidates.iter_mut() {
            if candidate.status != CandidateStatus::Running {
                continue;
            }
            match self.engine.get_status(migration_id, &candidate.id).await {
                Err(EngineError::RunNotFound { .. }) => {
                    self.store
                        .set_candidate_status(migration_id, &candidate.id, CandidateStatus::NotStarted)
                        .await
                        .map_err(map_store_error)?;
                    candidate.status = CandidateStatus::NotStarted;
                }
                Ok(_) | Err(_) => {}
            }
        }

        Ok(candidates)
    }

    /// Start a candidate's run: merge operator inputs
    /// over the candidate's own metadata, resolve its effective steps,
    /// mark it running, and hand the assembled manifest to the Execution
    /// Engine.
    pub async fn start(
        &self,
        migration_id: &str,
        candidate_id: &str,
        inputs: HashMap<String, String>,
    ) -> Result<EngineStatus, ServiceError> {
        let migration = self.require_migration(migration_id).await?;
        let candidate = migration
            .candidate(candidate_id)
            .cloned()
            .ok_or_else(|| ServiceError::candidate_not_found(migration_id, candidate_id))?;

        // A candidate stored `running` or `completed` only blocks a new
        // start if the engine confirms a live instance — otherwise the
        // stored status is stale (the workflow instance is gone) and the
        // run is healed through this very start rather than left wedged
        // (§4.5 step 3, "heal-through-start").
        if matches!(candidate.status, CandidateStatus::Running | CandidateStatus::Completed) {
            match self.engine.get_status(migration_id, candidate_id).await {
                Ok(status) if matches!(status.status, RunStatus::Running | RunStatus::Completed) => {
                    return Err(ServiceError::candidate_already_run(candidate_id, candidate.status.to_string()));
                }
                Ok(_) | Err(EngineError::RunNotFound { .. }) => {}
                Err(err) => return Err(map_engine_error(err)),
            }
        }

        let merged_metadata = candidate.merged_metadata(&inputs);
        let steps = candidate.effective_steps(&migration.steps).to_vec();
        let mut effective_candidate = candidate.clone();
        effective_candidate.metadata = merged_metadata;

        self.store
            .set_candidate_status(migration_id, candidate_id, CandidateStatus::Running)
            .await
            .map_err(map_store_error)?;

        let input = MigrationWorkflowInput {
            migration_id: migration_id.to_string(),
            candidate: effective_candidate,
            steps,
            migrator_url: migration.migrator_url.clone(),
            started_at: Utc::now(),
        };

        match self.engine.start(migration_id, candidate_id, input).await {
            Ok(status) => Ok(status),
            Err(err) => {
                // The run never got going: undo the status flip so the
                // candidate stays startable rather than wedged "running".
                let _ = self
                    .store
                    .set_candidate_status(migration_id, candidate_id, CandidateStatus::NotStarted)
                    .await;
                Err(map_engine_error(err))
            }
        }
    }

    /// Cancel a running candidate. A `RunNotFound`
    /// from the engine is reconciled by reading the Store's own idea of
    /// whether the candidate is running ("heal-through-read" — operator
    /// actions target a run that is supposed to already exist, so there
    /// is nothing useful to restart on its behalf).
    pub async fn cancel(&self, migration_id: &str, candidate_id: &str, reason: String) -> Result<(), ServiceError> {
        match self.engine.cancel(migration_id, candidate_id, reason).await {
            Ok(()) => Ok(()),
            Err(EngineError::RunNotFound { .. }) => self.reconcile_not_running(migration_id, candidate_id).await,
            Err(err) => Err(map_engine_error(err)),
        }
    }

    /// Retry a failed step. Same heal-through-read
    /// reconciliation as `cancel`.
    pub async fn retry_step(&self, migration_id: &str, candidate_id: &str, step_name: &str) -> Result<(), ServiceError> {
        let signal_type = retry_step_event(step_name, candidate_id);
        match self
            .engine
            .raise_event(migration_id, candidate_id, signal_type, serde_json::json!({}))
            .await
        {
            Ok(()) => Ok(()),
            Err(EngineError::RunNotFound { .. }) => self.reconcile_not_running(migration_id, candidate_id).await,
            Err(err) => Err(map_engine_error(err)),
        }
    }

    /// Merge operator-edited inputs into a running candidate (the
    /// `updateInputs`). Same heal-through-read reconciliation.
    pub async fn update_inputs(
        &self,
        migration_id: &str,
        candidate_id: &str,
        inputs: HashMap<String, String>,
    ) -> Result<(), ServiceError> {
        let signal_type = update_inputs_event(candidate_id);
        let payload = serde_json::to_value(&inputs).unwrap_or(serde_json::Value::Null);
        match self.engine.raise_event(migration_id, candidate_id, signal_type, payload).await {
            Ok(()) => Ok(()),
            Err(EngineError::RunNotFound { .. }) => self.reconcile_not_running(migration_id, candidate_id).await,
            Err(err) => Err(map_engine_error(err)),
        }
    }

    /// Deliver a migrator's `POST /event/{instanceId}` callback. Unlike
    /// the operator-facing use cases above,
    /// a `RunNotFound` here is reconciled by "heal-through-start": the
    /// Store and the engine are two independent, both in-memory sources
    /// of truth, and a migrator's callback may outlive a process restart
    /// that wiped the engine's workflow table while the Store still
    /// correctly remembers the candidate as running. Rather than drop the
    /// migrator's event on the floor, the run is transparently restarted
    /// from the Store's own record before the event is redelivered.
    pub async fn handle_event(&self, migration_id: &str, candidate_id: &str, event: StepStatusEvent) -> Result<(), ServiceError> {
        let signal_type = loom_core::identity::step_completed_event(&event.step_name, candidate_id);
        let payload = serde_json::json!({ "status": event.status, "metadata": event.metadata });

        match self
            .engine
            .raise_event(migration_id, candidate_id, signal_type.clone(), payload.clone())
            .await
        {
            Ok(()) => Ok(()),
            Err(EngineError::RunNotFound { .. }) => {
                self.heal_through_start(migration_id, candidate_id).await?;
                self.engine
                    .raise_event(migration_id, candidate_id, signal_type, payload)
                    .await
                    .map_err(map_engine_error)
            }
            Err(err) => Err(map_engine_error(err)),
        }
    }

    /// Live per-step state for a candidate. Per §4.5, a `RunNotFound`
    /// from the engine means there is simply nothing to report — no
    /// store lookup, no synthesized view, just `None`.
    pub async fn get_candidate_steps(
        &self,
        migration_id: &str,
        candidate_id: &str,
    ) -> Result<Option<CandidateStepsView>, ServiceError> {
        match self.engine.get_status(migration_id, candidate_id).await {
            Ok(status) => Ok(Some(CandidateStepsView {
                status: status.status.into(),
                steps: extract_steps(&status),
            })),
            Err(EngineError::RunNotFound { .. }) => Ok(None),
            Err(err) => Err(map_engine_error(err)),
        }
    }

    /// Simulate a candidate's step sequence against its dispatchable
    /// migrator without touching any run state.
    pub async fn dry_run(&self, migration_id: &str, candidate_id: &str) -> Result<DryRunResult, ServiceError> {
        let migration = self.require_migration(migration_id).await?;
        let candidate = migration
            .candidate(candidate_id)
            .cloned()
            .ok_or_else(|| ServiceError::candidate_not_found(migration_id, candidate_id))?;
        let steps = candidate.effective_steps(&migration.steps).to_vec();

        loom_notifier::first_dispatchable_step(&steps, &self.reserved_migrators)
            .ok_or(DryRunError::NoDispatchableMigrator)
            .map_err(map_dry_run_error)?;

        let request = DryRunRequest {
            migration_id: migration_id.to_string(),
            candidate: candidate_id.to_string(),
            steps,
            migrator_url: migration.migrator_url,
        };

        self.dry_run.dry_run(request).await.map_err(map_dry_run_error)
    }

    async fn reconcile_not_running(&self, migration_id: &str, candidate_id: &str) -> Result<(), ServiceError> {
        let candidate = self.require_candidate(migration_id, candidate_id).await?;
        if candidate.status == CandidateStatus::Running {
            // The Store thinks this candidate is running but the engine
            // has no record of it: the run is unrecoverable for an
            // operator-initiated action, so release the candidate rather
            // than leave it wedged.
            let _ = self
                .store
                .set_candidate_status(migration_id, candidate_id, CandidateStatus::NotStarted)
                .await;
        }
        Err(ServiceError::candidate_not_running(candidate_id))
    }

    async fn heal_through_start(&self, migration_id: &str, candidate_id: &str) -> Result<(), ServiceError> {
        let migration = self.require_migration(migration_id).await?;
        let candidate = migration
            .candidate(candidate_id)
            .cloned()
            .ok_or_else(|| ServiceError::candidate_not_found(migration_id, candidate_id))?;

        if candidate.status != CandidateStatus::Running {
            return Err(ServiceError::candidate_not_running(candidate_id));
        }

        let steps = candidate.effective_steps(&migration.steps).to_vec();
        let input = MigrationWorkflowInput {
            migration_id: migration_id.to_string(),
            candidate,
            steps,
            migrator_url: migration.migrator_url,
            started_at: Utc::now(),
        };

        match self.engine.start(migration_id, candidate_id, input).await {
            Ok(_) | Err(EngineError::AlreadyRunning { .. }) => Ok(()),
            Err(err) => Err(map_engine_error(err)),
        }
    }
}

fn extract_steps(status: &EngineStatus) -> Vec<StepState> {
    status
        .snapshot
        .as_ref()
        .and_then(|v| v.get("steps"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_else(|| status.output.as_ref().map(|o| o.steps.clone()).unwrap_or_default())
}
