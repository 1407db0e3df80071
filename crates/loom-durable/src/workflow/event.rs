//! Workflow events — the append-only log a workflow instance is replayed
//! from.

use serde::{Deserialize, Serialize};

use super::{ActivityOptions, WorkflowError, WorkflowSignal};
use crate::activity::ActivityError;

/// Events recorded for a workflow instance.
///
/// Immutable once written. Workflow state is reconstructed by replaying
/// every event for an instance in sequence order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowStarted {
        input: serde_json::Value,
    },
    WorkflowCompleted {
        result: serde_json::Value,
    },
    WorkflowFailed {
        error: WorkflowError,
    },
    WorkflowCancelled {
        reason: String,
    },

    ActivityScheduled {
        activity_id: String,
        activity_type: String,
        input: serde_json::Value,
        options: ActivityOptions,
    },
    ActivityCompleted {
        activity_id: String,
        result: serde_json::Value,
    },
    ActivityFailed {
        activity_id: String,
        error: ActivityError,
        will_retry: bool,
    },

    SignalReceived {
        signal: WorkflowSignal,
    },
}

impl WorkflowEvent {
    pub fn activity_id(&self) -> Option<&str> {
        match self {
            Self::ActivityScheduled { activity_id, .. }
            | Self::ActivityCompleted { activity_id, .. }
            | Self::ActivityFailed { activity_id, .. } => Some(activity_id),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowCompleted { .. } | Self::WorkflowFailed { .. } | Self::WorkflowCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workflow_event_round_trips() {
        let event = WorkflowEvent::WorkflowStarted {
            input: json!({"candidate_id": "repo-a"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"workflow_started\""));
        let parsed: WorkflowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }

    #[test]
    fn activity_id_extraction() {
        let event = WorkflowEvent::ActivityCompleted {
            activity_id: "step-build".to_string(),
            result: json!({}),
        };
        assert_eq!(event.activity_id(), Some("step-build"));

        let start_event = WorkflowEvent::WorkflowStarted { input: json!({}) };
        assert_eq!(start_event.activity_id(), None);
    }

    #[test]
    fn terminal_events() {
        assert!(WorkflowEvent::WorkflowCompleted { result: json!({}) }.is_terminal());
        assert!(WorkflowEvent::WorkflowCancelled { reason: "x".into() }.is_terminal());
        assert!(!WorkflowEvent::WorkflowStarted { input: json!({}) }.is_terminal());
    }
}
