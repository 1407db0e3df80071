//! Workflow signals for external communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An external signal delivered to a running workflow instance.
///
/// Signals are processed asynchronously and trigger `on_signal`. Loom
/// uses named, deterministically-derived signal types (`step-completed:
/// <step>:<candidate>`, `retry-step:...`, `update-inputs:...` — see
/// `loom_core::identity`) rather than server-issued callback tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSignal {
    pub signal_type: String,
    pub payload: serde_json::Value,
    pub sent_at: DateTime<Utc>,
}

impl WorkflowSignal {
    pub fn new(signal_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            signal_type: signal_type.into(),
            payload,
            sent_at: Utc::now(),
        }
    }

    /// Create a cancellation signal (always named `cancel`, independent
    /// of the domain-specific named signals above).
    pub fn cancel(reason: impl Into<String>) -> Self {
        Self::new(
            signal_types::CANCEL,
            serde_json::json!({ "reason": reason.into() }),
        )
    }

    pub fn is_cancel(&self) -> bool {
        self.signal_type == signal_types::CANCEL
    }
}

/// Common signal type constants.
pub mod signal_types {
    /// Request workflow cancellation.
    pub const CANCEL: &str = "cancel";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_signal_is_recognized() {
        let signal = WorkflowSignal::cancel("user cancelled");
        assert!(signal.is_cancel());
        assert_eq!(signal.signal_type, signal_types::CANCEL);
    }

    #[test]
    fn custom_signal_round_trips() {
        let signal = WorkflowSignal::new("step-completed:build:repo-a", serde_json::json!({"status": "succeeded"}));
        let json = serde_json::to_string(&signal).unwrap();
        let parsed: WorkflowSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(signal.signal_type, parsed.signal_type);
        assert_eq!(signal.payload, parsed.payload);
        assert!(!signal.is_cancel());
    }
}
