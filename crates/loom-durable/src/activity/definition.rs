//! Activity trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ActivityContext;

/// Error type for activity failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityError {
    pub message: String,
    pub error_type: Option<String>,

    /// Non-retryable errors fail the activity (and, in turn, the
    /// workflow) immediately without further attempts.
    pub retryable: bool,
}

impl ActivityError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: false,
        }
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }
}

impl std::fmt::Display for ActivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ActivityError {}

impl From<anyhow::Error> for ActivityError {
    fn from(err: anyhow::Error) -> Self {
        Self::retryable(err.to_string())
    }
}

/// A unit of work a workflow schedules and the executor runs locally
/// in-process: non-determinism is tunnelled through activities, not
/// the workflow body.
///
/// Loom's activities (`DispatchStep`, `UpdateCandidateStatus`,
/// `EmitLifecycleEvent`) are short: they hand a request to an external
/// port and return, they do not themselves block for the hours a step
/// may take to complete — that wait happens in the workflow via signals.
#[async_trait]
pub trait Activity: Send + Sync + 'static {
    const TYPE: &'static str;

    type Input: Serialize + for<'de> Deserialize<'de> + Send;
    type Output: Serialize + for<'de> Deserialize<'de> + Send;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_error_round_trips() {
        let error = ActivityError::retryable("connection reset").with_type("NETWORK");
        assert!(error.retryable);
        let json = serde_json::to_string(&error).unwrap();
        let parsed: ActivityError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, parsed);
    }

    #[test]
    fn non_retryable_error_stays_non_retryable() {
        let error = ActivityError::non_retryable("malformed payload");
        assert!(!error.retryable);
    }
}
