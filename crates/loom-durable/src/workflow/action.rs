//! Workflow actions and activity options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::WorkflowError;
use crate::reliability::{CircuitBreakerConfig, RetryPolicy};

/// Actions a workflow can request in response to an event.
///
/// Each action is persisted as a [`WorkflowEvent`](super::WorkflowEvent)
/// before it is executed, so replay reconstructs exactly what already
/// happened rather than re-triggering it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowAction {
    /// Schedule an activity for execution.
    ScheduleActivity {
        activity_id: String,
        activity_type: String,
        input: serde_json::Value,
        options: ActivityOptions,
    },

    /// Complete the workflow successfully with a result.
    CompleteWorkflow { result: serde_json::Value },

    /// Fail the workflow with an error.
    FailWorkflow { error: WorkflowError },

    /// Cancel the workflow cooperatively. Distinct from `FailWorkflow`
    /// because cancellation is not an orchestration failure.
    CancelWorkflow { reason: String },

    /// No action (event handling didn't trigger new work).
    None,
}

impl WorkflowAction {
    pub fn schedule_activity(
        activity_id: impl Into<String>,
        activity_type: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ScheduleActivity {
            activity_id: activity_id.into(),
            activity_type: activity_type.into(),
            input,
            options: ActivityOptions::default(),
        }
    }

    pub fn complete(result: serde_json::Value) -> Self {
        Self::CompleteWorkflow { result }
    }

    pub fn fail(error: WorkflowError) -> Self {
        Self::FailWorkflow { error }
    }

    pub fn cancel(reason: impl Into<String>) -> Self {
        Self::CancelWorkflow {
            reason: reason.into(),
        }
    }
}

/// Options for activity execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityOptions {
    pub retry_policy: RetryPolicy,

    /// Maximum time for activity execution (start to close).
    #[serde(with = "duration_serde")]
    pub start_to_close_timeout: Duration,

    /// Circuit breaker configuration for this activity, if any.
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            start_to_close_timeout: Duration::from_secs(300),
            circuit_breaker: None,
        }
    }
}

impl ActivityOptions {
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }
}

/// Serde support for `Duration` (as milliseconds).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schedule_activity_action() {
        let action =
            WorkflowAction::schedule_activity("step-1", "dispatch_step", json!({"key": "value"}));

        match action {
            WorkflowAction::ScheduleActivity {
                activity_id,
                activity_type,
                input,
                ..
            } => {
                assert_eq!(activity_id, "step-1");
                assert_eq!(activity_type, "dispatch_step");
                assert_eq!(input, json!({"key": "value"}));
            }
            _ => panic!("expected ScheduleActivity"),
        }
    }

    #[test]
    fn activity_options_round_trip() {
        let options = ActivityOptions::default()
            .with_start_to_close_timeout(Duration::from_secs(60 * 60 * 24));

        let json = serde_json::to_string(&options).unwrap();
        let parsed: ActivityOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.start_to_close_timeout, Duration::from_secs(86400));
    }

    #[test]
    fn action_serialization_round_trip() {
        let action = WorkflowAction::CancelWorkflow {
            reason: "operator requested".to_string(),
        };
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains("\"type\":\"cancel_workflow\""));
        let parsed: WorkflowAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, parsed);
    }
}
