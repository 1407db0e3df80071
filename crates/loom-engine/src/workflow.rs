//! The migration workflow itself: a durable per-candidate
//! state machine that dispatches steps in order, waits for completion
//! signals, and retries failed steps on operator request.
//!
//! This is the one place in the workspace where a "select over multiple
//! channels" wait becomes concrete: because
//! `loom_durable::Workflow` is driven by discrete `on_signal`/
//! `on_activity_completed` calls rather than an actual `select!`, a wait
//! over `{step-completed, cancel}` is expressed as "do nothing here, and
//! let whichever named signal arrives next route to the matching
//! handler" — the phase the workflow is in determines which signal names
//! it is prepared to act on.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use loom_core::identity::{retry_step_event, step_completed_event, update_inputs_event};
use loom_core::{Candidate, CandidateStatus, StepState, StepStatus};
use loom_durable::{
    ActivityError, ActivityOptions, RetryPolicy, Workflow, WorkflowAction, WorkflowError,
    WorkflowSignal,
};
use loom_notifier::DispatchStepRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::activities::{LifecycleEvent, LifecycleEventKind, UpdateCandidateStatusInput};

/// Input to one run of the migration workflow: everything the Service
/// assembled at `start` time, plus the run's start time so the workflow
/// can compute durations without ever reading a live clock itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationWorkflowInput {
    pub migration_id: String,
    pub candidate: Candidate,
    pub steps: Vec<loom_core::migration::StepDefinition>,
    pub migrator_url: String,
    pub started_at: DateTime<Utc>,
}

/// What the workflow returns when every step has succeeded or merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationWorkflowOutput {
    pub migration_id: String,
    pub candidate_id: String,
    pub steps: Vec<StepState>,
}

#[derive(Debug, Clone, Deserialize)]
struct StepCompletionPayload {
    status: StepStatus,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

/// What the deferred cleanup block is trying to accomplish once its
/// `UpdateCandidateStatus` activity finishes, whether that activity
/// succeeded or — by deliberate trade-off — failed after every retry
/// was exhausted. Either way the workflow still reports the
/// intended terminal outcome; losing a store write must never misreport
/// a migration that actually finished.
#[derive(Debug, Clone)]
enum CleanupIntent {
    DispatchFailed(WorkflowError),
    Cancelled(String),
    Completed(MigrationWorkflowOutput),
}

impl CleanupIntent {
    fn target_status(&self) -> CandidateStatus {
        match self {
            CleanupIntent::DispatchFailed(_) | CleanupIntent::Cancelled(_) => {
                CandidateStatus::NotStarted
            }
            CleanupIntent::Completed(_) => CandidateStatus::Completed,
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Completed(MigrationWorkflowOutput),
    Failed(WorkflowError),
}

/// Durable per-`(migration, candidate)` orchestrator.
pub struct MigrationWorkflow {
    input: MigrationWorkflowInput,
    /// Current merged view of candidate metadata: seeded from
    /// `input.candidate.metadata` (already merged with operator inputs at
    /// start time) and refined in place by `update-inputs` signals —
    /// drained non-blockingly simply by being
    /// consulted fresh every time a dispatch request is built.
    metadata: HashMap<String, String>,
    step_index: usize,
    /// Live result list, upserted by `(step_name, candidate_id)`.
    results: Vec<StepState>,
    /// Set while waiting for a `step-completed` signal for the current
    /// step; `None` whenever the workflow is not mid-dispatch (e.g.
    /// waiting for a retry, or cleaning up).
    awaiting_completion_since: Option<DateTime<Utc>>,
    /// Set while waiting for a `retry-step` signal after a failed step.
    awaiting_retry_since: Option<DateTime<Utc>>,
    /// Set while the deferred cleanup activity is outstanding.
    pending_cleanup: Option<CleanupIntent>,
    terminal: bool,
    outcome: Option<Outcome>,
}

impl MigrationWorkflow {
    fn current_step(&self) -> Option<&loom_core::migration::StepDefinition> {
        self.input.steps.get(self.step_index)
    }

    fn candidate_id(&self) -> &str {
        &self.input.candidate.id
    }

    fn upsert_result(&mut self, step_name: &str, status: StepStatus, metadata: HashMap<String, String>) {
        if let Some(existing) = self
            .results
            .iter_mut()
            .find(|r| r.step_name == step_name && r.candidate.id == self.input.candidate.id)
        {
            existing.upsert(status, metadata);
        } else {
            let mut state = StepState::new(step_name, self.input.candidate.clone(), status);
            state.upsert(status, metadata);
            self.results.push(state);
        }
    }

    fn remove_result(&mut self, step_name: &str) {
        self.results
            .retain(|r| !(r.step_name == step_name && r.candidate.id == self.input.candidate.id));
    }

    fn lifecycle_action(&self, kind: LifecycleEventKind, step_name: Option<String>, duration_ms: i64) -> WorkflowAction {
        let event = LifecycleEvent {
            migration_id: self.input.migration_id.clone(),
            candidate_id: self.candidate_id().to_string(),
            kind,
            step_name,
            duration_ms: Some(duration_ms),
        };
        WorkflowAction::ScheduleActivity {
            activity_id: format!("lifecycle-{kind:?}"),
            activity_type: "emit_lifecycle_event".to_string(),
            input: serde_json::to_value(&event).unwrap_or(Value::Null),
            options: ActivityOptions::default()
                .with_start_to_close_timeout(Duration::from_secs(5))
                .with_retry(RetryPolicy::no_retry()),
        }
    }

    /// Begin (or re-begin, on retry) dispatch of the current step:
    /// drains the current metadata view into the request, marks the
    /// result entry `in_progress`, and schedules the `DispatchStep`
    /// activity.
    fn begin_dispatch(&mut self, dispatched_at: DateTime<Utc>) -> Vec<WorkflowAction> {
        let Some(step) = self.current_step().cloned() else {
            // No steps at all: nothing to dispatch, the run is vacuously
            // complete.
            return self.finish_success();
        };

        self.upsert_result(&step.name, StepStatus::InProgress, HashMap::new());
        self.awaiting_completion_since = Some(dispatched_at);
        self.awaiting_retry_since = None;

        let mut candidate = self.input.candidate.clone();
        candidate.metadata = self.metadata.clone();

        let Ok(callback_id) = loom_core::identity::workflow_id(&self.input.migration_id, self.candidate_id()) else {
            return vec![WorkflowAction::fail(WorkflowError::new(
                "cannot derive workflow id for dispatch",
            ))];
        };

        let request = DispatchStepRequest {
            migration_id: self.input.migration_id.clone(),
            step_name: step.name.clone(),
            candidate,
            config: step.config.clone(),
            step_type: step.step_type.clone(),
            callback_id,
            event_name: step_completed_event(&step.name, self.candidate_id()),
            migrator_app: step.migrator_app.clone(),
            migrator_url: self.input.migrator_url.clone(),
        };

        let dispatched_ms = (dispatched_at - self.input.started_at).num_milliseconds();

        vec![
            self.lifecycle_action(LifecycleEventKind::StepDispatched, Some(step.name.clone()), dispatched_ms),
            WorkflowAction::ScheduleActivity {
                activity_id: "dispatch".to_string(),
                activity_type: "dispatch_step".to_string(),
                input: serde_json::to_value(&request).unwrap_or(Value::Null),
                options: ActivityOptions::default()
                    .with_start_to_close_timeout(Duration::from_secs(60 * 60 * 24)),
            },
        ]
    }

    fn begin_cleanup(&mut self, intent: CleanupIntent, lifecycle: Option<WorkflowAction>) -> Vec<WorkflowAction> {
        let status = intent.target_status();
        self.pending_cleanup = Some(intent);
        self.awaiting_completion_since = None;
        self.awaiting_retry_since = None;

        let cleanup_input = UpdateCandidateStatusInput {
            migration_id: self.input.migration_id.clone(),
            candidate_id: self.candidate_id().to_string(),
            status,
        };

        let cleanup_action = WorkflowAction::ScheduleActivity {
            activity_id: "cleanup".to_string(),
            activity_type: "update_candidate_status".to_string(),
            input: serde_json::to_value(&cleanup_input).unwrap_or(Value::Null),
            options: ActivityOptions::default()
                .with_start_to_close_timeout(Duration::from_secs(30))
                .with_retry(
                    RetryPolicy::exponential()
                        .with_max_attempts(3)
                        .with_initial_interval(Duration::from_secs(1))
                        .with_max_interval(Duration::from_secs(10)),
                ),
        };

        let mut actions = Vec::new();
        if let Some(a) = lifecycle {
            actions.push(a);
        }
        actions.push(cleanup_action);
        actions
    }

    /// Run out of steps to dispatch: mark the candidate completed once
    /// the cleanup activity has written it through — the success-path
    /// mirror of the cancel/dispatch-failure `not_started` write.
    fn finish_success(&mut self) -> Vec<WorkflowAction> {
        let output = MigrationWorkflowOutput {
            migration_id: self.input.migration_id.clone(),
            candidate_id: self.candidate_id().to_string(),
            steps: self.results.clone(),
        };
        self.begin_cleanup(CleanupIntent::Completed(output), None)
    }

    /// Resolve a cleanup activity's outcome (success or exhausted
    /// retries) into the workflow's final action.
    fn finish_cleanup(&mut self) -> Vec<WorkflowAction> {
        let Some(intent) = self.pending_cleanup.take() else {
            return vec![];
        };
        self.terminal = true;
        match intent {
            CleanupIntent::DispatchFailed(error) => {
                self.outcome = Some(Outcome::Failed(error.clone()));
                vec![WorkflowAction::fail(error)]
            }
            CleanupIntent::Cancelled(reason) => vec![WorkflowAction::cancel(reason)],
            CleanupIntent::Completed(output) => {
                self.outcome = Some(Outcome::Completed(output.clone()));
                vec![WorkflowAction::complete(
                    serde_json::to_value(&output).unwrap_or(Value::Null),
                )]
            }
        }
    }

    fn handle_update_inputs(&mut self, signal: &WorkflowSignal) {
        if let Ok(updates) = serde_json::from_value::<HashMap<String, String>>(signal.payload.clone()) {
            for (k, v) in updates {
                self.metadata.insert(k, v);
            }
        } else {
            warn!(candidate = %self.candidate_id(), "ignoring malformed update-inputs payload");
        }
    }

    fn handle_step_completed(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        let Some(dispatched_at) = self.awaiting_completion_since else {
            // Not currently waiting on this step (already moved on, or a
            // stray duplicate) — nothing to do.
            return vec![];
        };
        let Some(step) = self.current_step().cloned() else {
            return vec![];
        };
        let Ok(payload) = serde_json::from_value::<StepCompletionPayload>(signal.payload.clone()) else {
            warn!(candidate = %self.candidate_id(), "ignoring malformed step-completed payload");
            return vec![];
        };

        self.upsert_result(&step.name, payload.status, payload.metadata.unwrap_or_default());

        match payload.status {
            StepStatus::Pending => vec![],
            StepStatus::InProgress => vec![],
            StepStatus::Failed => {
                self.awaiting_completion_since = None;
                self.awaiting_retry_since = Some(signal.sent_at);
                vec![]
            }
            StepStatus::Succeeded | StepStatus::Merged => {
                let completed_ms = (signal.sent_at - dispatched_at).num_milliseconds();
                let lifecycle = self.lifecycle_action(
                    LifecycleEventKind::StepCompleted,
                    Some(step.name.clone()),
                    completed_ms,
                );

                if self.step_index + 1 >= self.input.steps.len() {
                    let run_ms = (signal.sent_at - self.input.started_at).num_milliseconds();
                    let run_completed = self.lifecycle_action(LifecycleEventKind::RunCompleted, None, run_ms);
                    let output = MigrationWorkflowOutput {
                        migration_id: self.input.migration_id.clone(),
                        candidate_id: self.candidate_id().to_string(),
                        steps: self.results.clone(),
                    };
                    let mut actions = vec![lifecycle, run_completed];
                    actions.extend(self.begin_cleanup(CleanupIntent::Completed(output), None));
                    actions
                } else {
                    self.step_index += 1;
                    let mut actions = vec![lifecycle];
                    actions.extend(self.begin_dispatch(signal.sent_at));
                    actions
                }
            }
        }
    }

    fn handle_retry(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        let Some(failed_at) = self.awaiting_retry_since else {
            return vec![];
        };
        let Some(step) = self.current_step().cloned() else {
            return vec![];
        };

        self.remove_result(&step.name);
        let retry_ms = (signal.sent_at - failed_at).num_milliseconds();
        let lifecycle = self.lifecycle_action(LifecycleEventKind::StepRetried, Some(step.name.clone()), retry_ms);

        let mut actions = vec![lifecycle];
        actions.extend(self.begin_dispatch(signal.sent_at));
        actions
    }

    fn handle_cancel(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        if self.terminal || self.pending_cleanup.is_some() {
            return vec![];
        }
        let reason = signal
            .payload
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("operator requested")
            .to_string();
        let run_ms = (signal.sent_at - self.input.started_at).num_milliseconds();
        let lifecycle = self.lifecycle_action(LifecycleEventKind::RunCancelled, None, run_ms);
        self.begin_cleanup(CleanupIntent::Cancelled(reason), Some(lifecycle))
    }
}

impl Workflow for MigrationWorkflow {
    const TYPE: &'static str = "migration_workflow";
    type Input = MigrationWorkflowInput;
    type Output = MigrationWorkflowOutput;

    fn new(input: Self::Input) -> Self {
        let metadata = input.candidate.metadata.clone();
        Self {
            input,
            metadata,
            step_index: 0,
            results: Vec::new(),
            awaiting_completion_since: None,
            awaiting_retry_since: None,
            pending_cleanup: None,
            terminal: false,
            outcome: None,
        }
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        let mut actions = vec![self.lifecycle_action(LifecycleEventKind::RunStarted, None, 0)];
        let started_at = self.input.started_at;
        actions.extend(self.begin_dispatch(started_at));
        actions
    }

    fn on_activity_completed(&mut self, activity_id: &str, _result: Value) -> Vec<WorkflowAction> {
        match activity_id {
            "cleanup" => self.finish_cleanup(),
            // "dispatch" just acknowledges that the migrator was asked;
            // the workflow is now truly waiting on a named signal.
            // lifecycle activities never trigger follow-up work either.
            _ => vec![],
        }
    }

    fn on_activity_failed(&mut self, activity_id: &str, error: &ActivityError) -> Vec<WorkflowAction> {
        match activity_id {
            "dispatch" => {
                let step = self.current_step().map(|s| s.name.clone());
                warn!(candidate = %self.candidate_id(), ?step, %error, "dispatch activity failed, entering cleanup");
                self.begin_cleanup(
                    CleanupIntent::DispatchFailed(WorkflowError::new(error.message.clone())),
                    None,
                )
            }
            "cleanup" => {
                warn!(candidate = %self.candidate_id(), %error, "cleanup activity failed after retries, reporting intended outcome anyway");
                self.finish_cleanup()
            }
            _ => vec![],
        }
    }

    fn on_signal(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
        if signal.is_cancel() {
            return self.handle_cancel(signal);
        }

        if self.terminal {
            return vec![];
        }

        if signal.signal_type == update_inputs_event(self.candidate_id()) {
            self.handle_update_inputs(signal);
            return vec![];
        }

        let Some(step) = self.current_step().cloned() else {
            return vec![];
        };

        if signal.signal_type == step_completed_event(&step.name, self.candidate_id()) {
            return self.handle_step_completed(signal);
        }

        if signal.signal_type == retry_step_event(&step.name, self.candidate_id()) {
            return self.handle_retry(signal);
        }

        vec![]
    }

    fn is_completed(&self) -> bool {
        self.terminal
    }

    fn result(&self) -> Option<Self::Output> {
        match &self.outcome {
            Some(Outcome::Completed(output)) => Some(output.clone()),
            _ => None,
        }
    }

    fn error(&self) -> Option<WorkflowError> {
        match &self.outcome {
            Some(Outcome::Failed(error)) => Some(error.clone()),
            _ => None,
        }
    }

    fn snapshot(&self) -> Option<Value> {
        Some(serde_json::json!({
            "migration_id": self.input.migration_id,
            "candidate_id": self.candidate_id(),
            "steps": self.results,
        }))
    }
}
