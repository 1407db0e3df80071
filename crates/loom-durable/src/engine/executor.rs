//! Workflow executor: drives workflow state machines by replaying
//! persisted events and executing scheduled activities.
//!
//! Unlike a distributed-worker-pool executor, this one runs activities
//! locally and synchronously: when a workflow action schedules an
//! activity, the executor looks up the handler in its
//! [`ActivityRegistry`](super::ActivityRegistry), runs it to completion
//! (retrying per its [`RetryPolicy`](crate::RetryPolicy) with real
//! sleeps between attempts), and feeds the outcome straight back into
//! the workflow — all within the same call. Loom's activities are short
//! calls to a port (`DispatchStep`, `UpdateCandidateStatus`,
//! `EmitLifecycleEvent`); they don't need a claim/heartbeat/poll
//! machinery, they need to run once, reliably, and report back.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::activity::{ActivityContext, ActivityError};
use crate::persistence::{StoreError, WorkflowEventStore, WorkflowInfo, WorkflowStatus};
use crate::workflow::{Workflow, WorkflowAction, WorkflowError, WorkflowEvent, WorkflowSignal};

use super::activities::ActivityRegistry;
use super::registry::{AnyWorkflow, RegistryError, WorkflowRegistry};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Safety cap; a workflow that grows past this many events is
    /// treated as a bug rather than replayed indefinitely.
    pub max_events_per_workflow: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_events_per_workflow: 10_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("workflow {0} already completed")]
    WorkflowCompleted(String),

    #[error("replay error: {0}")]
    ReplayError(String),

    #[error("workflow {0} has too many events ({1} > {2})")]
    TooManyEvents(String, usize, usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a call that drove a workflow forward.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub status: WorkflowStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<WorkflowError>,
}

impl WorkflowOutcome {
    fn from_info(info: &WorkflowInfo) -> Self {
        Self {
            status: info.status,
            result: info.result.clone(),
            error: info.error.clone(),
        }
    }
}

/// Drives workflow instances: starts them, delivers signals, and runs
/// the activities they schedule.
///
/// # Example
///
/// ```ignore
/// let store = InMemoryWorkflowEventStore::new();
/// let mut executor = WorkflowExecutor::new(store);
/// executor.register_workflow::<MigrationWorkflow>();
/// executor.register_activity(DispatchStepActivity::new(port));
///
/// executor.start_workflow::<MigrationWorkflow>("m::repo-a", input).await?;
/// ```
pub struct WorkflowExecutor<S: WorkflowEventStore> {
    store: Arc<S>,
    workflows: WorkflowRegistry,
    activities: ActivityRegistry,
    config: ExecutorConfig,
}

impl<S: WorkflowEventStore> WorkflowExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            workflows: WorkflowRegistry::new(),
            activities: ActivityRegistry::new(),
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(store: S, config: ExecutorConfig) -> Self {
        Self {
            store: Arc::new(store),
            workflows: WorkflowRegistry::new(),
            activities: ActivityRegistry::new(),
            config,
        }
    }

    pub fn register_workflow<W: Workflow>(&mut self) {
        self.workflows.register::<W>();
        info!(workflow_type = W::TYPE, "registered workflow type");
    }

    pub fn register_activity<A: crate::activity::Activity>(&mut self, activity: A) {
        info!(activity_type = A::TYPE, "registered activity type");
        self.activities.register(activity);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a new workflow with a caller-supplied, deterministic id
    /// (Loom derives these from `migration_id`/`candidate_id`, it never
    /// generates them — see `loom_core::identity`).
    #[instrument(skip(self, workflow_id, input), fields(workflow_type = W::TYPE))]
    pub async fn start_workflow<W: Workflow>(
        &self,
        workflow_id: impl Into<String>,
        input: W::Input,
    ) -> Result<WorkflowOutcome, ExecutorError> {
        let workflow_id = workflow_id.into();
        let input_json = serde_json::to_value(&input)?;

        info!(%workflow_id, "starting workflow");

        self.store
            .start_or_restart_workflow(&workflow_id, W::TYPE, input_json.clone())
            .await?;

        self.store
            .append_events(
                &workflow_id,
                0,
                vec![WorkflowEvent::WorkflowStarted {
                    input: input_json,
                }],
            )
            .await?;

        let mut workflow = self.workflows.create(W::TYPE, input_json.clone())?;
        let actions = workflow.on_start();

        let sequence = 1;
        let (_sequence, cancelled) = self
            .drive(&workflow_id, &mut *workflow, sequence, actions)
            .await?;

        self.finalize(&workflow_id, &*workflow, cancelled).await
    }

    /// Deliver a signal to a running workflow, then run whatever
    /// actions result.
    #[instrument(skip(self, signal))]
    pub async fn signal(
        &self,
        workflow_id: &str,
        signal: WorkflowSignal,
    ) -> Result<WorkflowOutcome, ExecutorError> {
        let (mut workflow, sequence) = self.load_and_replay(workflow_id).await?;

        if workflow.is_completed() {
            warn!(%workflow_id, "signal sent to completed workflow");
            return Err(ExecutorError::WorkflowCompleted(workflow_id.to_string()));
        }

        let actions = workflow.on_signal(&signal);

        let sequence = self
            .store
            .append_events(
                workflow_id,
                sequence,
                vec![WorkflowEvent::SignalReceived { signal }],
            )
            .await?;

        let (_sequence, cancelled) = self
            .drive(workflow_id, &mut *workflow, sequence, actions)
            .await?;

        self.finalize(workflow_id, &*workflow, cancelled).await
    }

    pub async fn cancel_workflow(
        &self,
        workflow_id: &str,
        reason: impl Into<String>,
    ) -> Result<WorkflowOutcome, ExecutorError> {
        self.signal(workflow_id, WorkflowSignal::cancel(reason)).await
    }

    pub async fn workflow_info(&self, workflow_id: &str) -> Result<WorkflowInfo, ExecutorError> {
        Ok(self.store.get_workflow_info(workflow_id).await?)
    }

    pub async fn workflow_exists(&self, workflow_id: &str) -> Result<bool, ExecutorError> {
        Ok(self.store.workflow_exists(workflow_id).await?)
    }

    /// Replay a workflow's live state for querying, without delivering
    /// anything new to it.
    pub async fn query_snapshot(
        &self,
        workflow_id: &str,
    ) -> Result<Option<serde_json::Value>, ExecutorError> {
        let (workflow, _sequence) = self.load_and_replay(workflow_id).await?;
        Ok(workflow.snapshot_json())
    }

    // -- internal -------------------------------------------------------

    async fn load_and_replay(
        &self,
        workflow_id: &str,
    ) -> Result<(Box<dyn AnyWorkflow>, i32), ExecutorError> {
        let info = self.store.get_workflow_info(workflow_id).await?;
        let events = self.store.load_events(workflow_id).await?;

        if events.len() > self.config.max_events_per_workflow {
            return Err(ExecutorError::TooManyEvents(
                workflow_id.to_string(),
                events.len(),
                self.config.max_events_per_workflow,
            ));
        }

        if !matches!(events.first(), Some((_, WorkflowEvent::WorkflowStarted { .. }))) {
            return Err(ExecutorError::ReplayError(
                "first event must be WorkflowStarted".to_string(),
            ));
        }

        let mut workflow = self.workflows.create(&info.workflow_type, info.input.clone())?;

        for (_seq, event) in &events {
            replay_event(&mut *workflow, event);
        }

        Ok((workflow, events.len() as i32))
    }

    /// Run `actions` to completion: persist terminal actions, and for
    /// each scheduled activity, execute it locally (with retries),
    /// pushing whatever its completion or failure produces to the front
    /// of the work queue so it is processed before any sibling action
    /// (matching the order a recursive call would have produced,
    /// without needing one — `async fn` cannot recurse directly).
    #[allow(clippy::too_many_lines)]
    async fn drive(
        &self,
        workflow_id: &str,
        workflow: &mut dyn AnyWorkflow,
        mut sequence: i32,
        actions: Vec<WorkflowAction>,
    ) -> Result<(i32, bool), ExecutorError> {
        let mut queue: std::collections::VecDeque<WorkflowAction> = actions.into();
        let mut cancelled = false;

        while let Some(action) = queue.pop_front() {
            match action {
                WorkflowAction::ScheduleActivity {
                    activity_id,
                    activity_type,
                    input,
                    options,
                } => {
                    debug!(%workflow_id, %activity_id, %activity_type, "scheduling activity");

                    sequence = self
                        .store
                        .append_events(
                            workflow_id,
                            sequence,
                            vec![WorkflowEvent::ActivityScheduled {
                                activity_id: activity_id.clone(),
                                activity_type: activity_type.clone(),
                                input: input.clone(),
                                options: options.clone(),
                            }],
                        )
                        .await?;

                    let outcome = self
                        .run_activity(workflow_id, &activity_id, &activity_type, input, &options)
                        .await;

                    let follow_up_actions = match outcome {
                        Ok(result) => {
                            sequence = self
                                .store
                                .append_events(
                                    workflow_id,
                                    sequence,
                                    vec![WorkflowEvent::ActivityCompleted {
                                        activity_id: activity_id.clone(),
                                        result: result.clone(),
                                    }],
                                )
                                .await?;
                            workflow.on_activity_completed(&activity_id, result)
                        }
                        Err(error) => {
                            warn!(%workflow_id, %activity_id, %error, "activity failed permanently");
                            sequence = self
                                .store
                                .append_events(
                                    workflow_id,
                                    sequence,
                                    vec![WorkflowEvent::ActivityFailed {
                                        activity_id: activity_id.clone(),
                                        error: error.clone(),
                                        will_retry: false,
                                    }],
                                )
                                .await?;
                            workflow.on_activity_failed(&activity_id, &error)
                        }
                    };

                    for (i, action) in follow_up_actions.into_iter().enumerate() {
                        queue.insert(i, action);
                    }
                }

                WorkflowAction::CompleteWorkflow { result } => {
                    info!(%workflow_id, "workflow completed");
                    sequence = self
                        .store
                        .append_events(
                            workflow_id,
                            sequence,
                            vec![WorkflowEvent::WorkflowCompleted {
                                result: result.clone(),
                            }],
                        )
                        .await?;
                }

                WorkflowAction::FailWorkflow { error } => {
                    error!(%workflow_id, error = %error, "workflow failed");
                    sequence = self
                        .store
                        .append_events(
                            workflow_id,
                            sequence,
                            vec![WorkflowEvent::WorkflowFailed { error }],
                        )
                        .await?;
                }

                WorkflowAction::CancelWorkflow { reason } => {
                    info!(%workflow_id, %reason, "workflow cancelled");
                    sequence = self
                        .store
                        .append_events(
                            workflow_id,
                            sequence,
                            vec![WorkflowEvent::WorkflowCancelled { reason }],
                        )
                        .await?;
                    cancelled = true;
                }

                WorkflowAction::None => {}
            }
        }

        Ok((sequence, cancelled))
    }

    async fn run_activity(
        &self,
        workflow_id: &str,
        activity_id: &str,
        activity_type: &str,
        input: serde_json::Value,
        options: &crate::workflow::ActivityOptions,
    ) -> Result<serde_json::Value, ActivityError> {
        let handler = self.activities.get(activity_type).ok_or_else(|| {
            ActivityError::non_retryable(format!("no activity registered for type {activity_type}"))
        })?;

        let max_attempts = options.retry_policy.max_attempts;
        let mut attempt = 1;

        loop {
            let ctx = ActivityContext::new(workflow_id, activity_id, attempt, max_attempts);

            let attempt_result = tokio::time::timeout(
                options.start_to_close_timeout,
                handler.execute(&ctx, input.clone()),
            )
            .await;

            let error = match attempt_result {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(error)) => error,
                Err(_) => ActivityError::retryable(format!(
                    "activity {activity_id} timed out after {:?}",
                    options.start_to_close_timeout
                )),
            };

            let can_retry = error.retryable
                && options.retry_policy.should_retry(error.error_type.as_deref())
                && options.retry_policy.has_attempts_remaining(attempt);

            if !can_retry {
                return Err(error);
            }

            attempt += 1;
            let delay = options.retry_policy.delay_for_attempt(attempt);
            debug!(%workflow_id, %activity_id, attempt, ?delay, "retrying activity");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn finalize(
        &self,
        workflow_id: &str,
        workflow: &dyn AnyWorkflow,
        cancelled: bool,
    ) -> Result<WorkflowOutcome, ExecutorError> {
        if cancelled {
            self.store
                .update_workflow_status(workflow_id, WorkflowStatus::Cancelled, None, None)
                .await?;
        } else if let Some(result) = workflow.result_json() {
            self.store
                .update_workflow_status(workflow_id, WorkflowStatus::Completed, Some(result), None)
                .await?;
        } else if let Some(error) = workflow.error() {
            self.store
                .update_workflow_status(workflow_id, WorkflowStatus::Failed, None, Some(error))
                .await?;
        }

        let info = self.store.get_workflow_info(workflow_id).await?;
        Ok(WorkflowOutcome::from_info(&info))
    }
}

/// Replay a single persisted event against a live workflow instance,
/// discarding the actions it produces (they already happened, we only
/// want the resulting state).
fn replay_event(workflow: &mut dyn AnyWorkflow, event: &WorkflowEvent) {
    match event {
        WorkflowEvent::WorkflowStarted { .. } => {
            let _ = workflow.on_start();
        }
        WorkflowEvent::ActivityCompleted { activity_id, result } => {
            let _ = workflow.on_activity_completed(activity_id, result.clone());
        }
        WorkflowEvent::ActivityFailed {
            activity_id,
            error,
            will_retry,
        } => {
            if !will_retry {
                let _ = workflow.on_activity_failed(activity_id, error);
            }
        }
        WorkflowEvent::SignalReceived { signal } => {
            let _ = workflow.on_signal(signal);
        }
        WorkflowEvent::WorkflowCompleted { .. }
        | WorkflowEvent::WorkflowFailed { .. }
        | WorkflowEvent::WorkflowCancelled { .. }
        | WorkflowEvent::ActivityScheduled { .. } => {
            // Informational during replay; the state they caused was
            // already applied by the handlers above.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Activity;
    use crate::persistence::InMemoryWorkflowEventStore;
    use crate::reliability::RetryPolicy;
    use crate::workflow::ActivityOptions;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct EchoInput {
        value: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct EchoOutput {
        value: i32,
    }

    struct EchoWorkflow {
        input: EchoInput,
        completed: bool,
    }

    impl Workflow for EchoWorkflow {
        const TYPE: &'static str = "echo_workflow";
        type Input = EchoInput;
        type Output = EchoOutput;

        fn new(input: Self::Input) -> Self {
            Self {
                input,
                completed: false,
            }
        }

        fn on_start(&mut self) -> Vec<WorkflowAction> {
            vec![WorkflowAction::ScheduleActivity {
                activity_id: "echo".to_string(),
                activity_type: "echo_activity".to_string(),
                input: serde_json::json!({ "n": self.input.value }),
                options: ActivityOptions::default()
                    .with_retry(RetryPolicy::fixed(std::time::Duration::from_millis(1), 5)),
            }]
        }

        fn on_activity_completed(&mut self, _activity_id: &str, result: serde_json::Value) -> Vec<WorkflowAction> {
            self.completed = true;
            vec![WorkflowAction::complete(result)]
        }

        fn on_activity_failed(&mut self, _activity_id: &str, error: &ActivityError) -> Vec<WorkflowAction> {
            vec![WorkflowAction::fail(WorkflowError::new(&error.message))]
        }

        fn is_completed(&self) -> bool {
            self.completed
        }

        fn result(&self) -> Option<Self::Output> {
            self.completed.then_some(EchoOutput {
                value: self.input.value,
            })
        }
    }

    #[derive(Serialize, Deserialize)]
    struct EchoActivityInput {
        n: i32,
    }

    struct EchoActivity;

    #[async_trait]
    impl Activity for EchoActivity {
        const TYPE: &'static str = "echo_activity";
        type Input = EchoActivityInput;
        type Output = EchoActivityInput;

        async fn execute(&self, _ctx: &ActivityContext, input: Self::Input) -> Result<Self::Output, ActivityError> {
            Ok(input)
        }
    }

    struct AlwaysFailsActivity;

    #[async_trait]
    impl Activity for AlwaysFailsActivity {
        const TYPE: &'static str = "echo_activity";
        type Input = EchoActivityInput;
        type Output = EchoActivityInput;

        async fn execute(&self, _ctx: &ActivityContext, _input: Self::Input) -> Result<Self::Output, ActivityError> {
            Err(ActivityError::non_retryable("boom"))
        }
    }

    fn build_executor(fails: bool) -> WorkflowExecutor<InMemoryWorkflowEventStore> {
        let store = InMemoryWorkflowEventStore::new();
        let mut executor = WorkflowExecutor::new(store);
        executor.register_workflow::<EchoWorkflow>();
        if fails {
            executor.register_activity(AlwaysFailsActivity);
        } else {
            executor.register_activity(EchoActivity);
        }
        executor
    }

    #[tokio::test]
    async fn start_workflow_runs_activity_and_completes() {
        let executor = build_executor(false);
        let outcome = executor
            .start_workflow::<EchoWorkflow>("m::c", EchoInput { value: 42 })
            .await
            .unwrap();

        assert_eq!(outcome.status, WorkflowStatus::Completed);
        assert_eq!(outcome.result, Some(serde_json::json!({ "n": 42 })));
    }

    #[tokio::test]
    async fn activity_failure_fails_the_workflow() {
        let executor = build_executor(true);
        let outcome = executor
            .start_workflow::<EchoWorkflow>("m::c", EchoInput { value: 1 })
            .await
            .unwrap();

        assert_eq!(outcome.status, WorkflowStatus::Failed);
        assert!(outcome.error.unwrap().message.contains("boom"));
    }

    #[tokio::test]
    async fn event_log_replays_to_the_same_outcome() {
        let executor = build_executor(false);
        executor
            .start_workflow::<EchoWorkflow>("m::c", EchoInput { value: 7 })
            .await
            .unwrap();

        let events = executor.store().load_events("m::c").await.unwrap();
        assert!(matches!(events[0].1, WorkflowEvent::WorkflowStarted { .. }));
        assert!(events
            .iter()
            .any(|(_, e)| matches!(e, WorkflowEvent::WorkflowCompleted { .. })));
    }

    struct WaitingWorkflow {
        cancelled: bool,
    }

    impl Workflow for WaitingWorkflow {
        const TYPE: &'static str = "waiting_workflow";
        type Input = ();
        type Output = ();

        fn new(_input: Self::Input) -> Self {
            Self { cancelled: false }
        }

        fn on_start(&mut self) -> Vec<WorkflowAction> {
            vec![]
        }

        fn on_activity_completed(&mut self, _activity_id: &str, _result: serde_json::Value) -> Vec<WorkflowAction> {
            vec![]
        }

        fn on_activity_failed(&mut self, _activity_id: &str, _error: &ActivityError) -> Vec<WorkflowAction> {
            vec![]
        }

        fn on_signal(&mut self, signal: &WorkflowSignal) -> Vec<WorkflowAction> {
            if signal.is_cancel() {
                self.cancelled = true;
                vec![WorkflowAction::cancel("operator requested")]
            } else {
                vec![]
            }
        }

        fn is_completed(&self) -> bool {
            self.cancelled
        }

        fn result(&self) -> Option<Self::Output> {
            None
        }
    }

    #[tokio::test]
    async fn cancel_marks_workflow_status_cancelled() {
        let store = InMemoryWorkflowEventStore::new();
        let mut executor = WorkflowExecutor::new(store);
        executor.register_workflow::<WaitingWorkflow>();

        executor
            .start_workflow::<WaitingWorkflow>("m::c", ())
            .await
            .unwrap();

        let outcome = executor.cancel_workflow("m::c", "operator requested").await.unwrap();
        assert_eq!(outcome.status, WorkflowStatus::Cancelled);

        let info = executor.workflow_info("m::c").await.unwrap();
        assert_eq!(info.status, WorkflowStatus::Cancelled);
    }

    #[tokio::test]
    async fn restarting_a_workflow_id_after_completion_is_allowed() {
        let executor = build_executor(false);
        executor
            .start_workflow::<EchoWorkflow>("m::c", EchoInput { value: 1 })
            .await
            .unwrap();

        let outcome = executor
            .start_workflow::<EchoWorkflow>("m::c", EchoInput { value: 2 })
            .await
            .unwrap();

        assert_eq!(outcome.status, WorkflowStatus::Completed);
        assert_eq!(outcome.result, Some(serde_json::json!({ "n": 2 })));

        let events = executor.store().load_events("m::c").await.unwrap();
        assert!(matches!(events[0].1, WorkflowEvent::WorkflowStarted { .. }));
        assert_eq!(
            events.iter().filter(|(_, e)| matches!(e, WorkflowEvent::WorkflowStarted { .. })).count(),
            1,
            "restart replaces the prior run's history rather than appending to it"
        );
    }

    #[tokio::test]
    async fn restarting_a_non_terminal_workflow_id_is_rejected() {
        let store = InMemoryWorkflowEventStore::new();
        let mut executor = WorkflowExecutor::new(store);
        executor.register_workflow::<WaitingWorkflow>();

        executor.start_workflow::<WaitingWorkflow>("m::c", ()).await.unwrap();

        let result = executor.start_workflow::<WaitingWorkflow>("m::c", ()).await;
        assert!(matches!(
            result,
            Err(ExecutorError::Store(StoreError::AlreadyExists(_)))
        ));
    }

    #[tokio::test]
    async fn signal_to_completed_workflow_errors() {
        let executor = build_executor(false);
        executor
            .start_workflow::<EchoWorkflow>("m::c", EchoInput { value: 1 })
            .await
            .unwrap();

        let result = executor.cancel_workflow("m::c", "operator requested").await;
        assert!(matches!(result, Err(ExecutorError::WorkflowCompleted(_))));
    }

    #[tokio::test]
    async fn retry_policy_is_honored_on_retryable_failures() {
        struct FlakyActivity {
            calls: std::sync::atomic::AtomicU32,
        }

        #[async_trait]
        impl Activity for FlakyActivity {
            const TYPE: &'static str = "echo_activity";
            type Input = EchoActivityInput;
            type Output = EchoActivityInput;

            async fn execute(&self, ctx: &ActivityContext, input: Self::Input) -> Result<Self::Output, ActivityError> {
                self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if ctx.attempt < 2 {
                    Err(ActivityError::retryable("transient"))
                } else {
                    Ok(input)
                }
            }
        }

        let store = InMemoryWorkflowEventStore::new();
        let mut executor = WorkflowExecutor::new(store);
        executor.register_workflow::<EchoWorkflow>();
        executor.register_activity(FlakyActivity {
            calls: std::sync::atomic::AtomicU32::new(0),
        });

        let outcome = executor
            .start_workflow::<EchoWorkflow>("m::c", EchoInput { value: 9 })
            .await
            .unwrap();

        assert_eq!(outcome.status, WorkflowStatus::Completed);
    }
}
