//! Per-(step, candidate) run state produced by the workflow.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::candidate::Candidate;

/// Status of one step execution attempt for one candidate.
///
/// `Pending` is the PR-opened intermediate state: the migrator has
/// streamed progress but the final outcome isn't known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Succeeded,
    Merged,
    Failed,
}

impl StepStatus {
    /// Whether this status ends the dispatch/wait loop for its step.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Merged)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Merged => "merged",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One entry in the workflow's live result list, keyed by
/// `(step_name, candidate.id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StepState {
    pub step_name: String,
    pub candidate: Candidate,
    pub status: StepStatus,
    /// Conventional keys: `prUrl`, `instructions`, `commitSha`; anything
    /// else a migrator chooses to attach passes through untouched.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The wire shape a migrator posts to `POST /event/{instanceId}`.
/// `metadata` is `None` when the migrator sends no metadata at
/// all (as opposed to an explicit empty map); both have the same effect
/// on [`StepState::upsert`] — no keys are overwritten — but keeping the
/// distinction lets the wire format round-trip what was actually sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StepStatusEvent {
    pub step_name: String,
    pub candidate_id: String,
    pub status: StepStatus,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl StepState {
    pub fn new(step_name: impl Into<String>, candidate: Candidate, status: StepStatus) -> Self {
        Self {
            step_name: step_name.into(),
            candidate,
            status,
            metadata: HashMap::new(),
        }
    }

    /// Upsert an incoming event's status/metadata over this entry.
    ///
    /// Metadata is merged key-by-key: keys present in the incoming event
    /// overwrite, keys absent from it retain their prior value. An event
    /// with empty metadata therefore changes only `status` — this is what
    /// keeps a worker-provided `prUrl` alive across a later "mark done"
    /// event that carries no metadata.
    pub fn upsert(&mut self, status: StepStatus, metadata: HashMap<String, String>) {
        self.status = status;
        for (k, v) in metadata {
            self.metadata.insert(k, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{Candidate, CandidateStatus};

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            kind: "repo".to_string(),
            metadata: HashMap::new(),
            steps: None,
            file_groups: vec![],
            status: CandidateStatus::NotStarted,
        }
    }

    #[test]
    fn upsert_preserves_metadata_across_nil_update() {
        let mut state = StepState::new("build", candidate("x"), StepStatus::Pending);
        state.upsert(
            StepStatus::Pending,
            HashMap::from([("prUrl".to_string(), "https://example/1".to_string())]),
        );
        state.upsert(StepStatus::Merged, HashMap::new());

        assert_eq!(state.status, StepStatus::Merged);
        assert_eq!(state.metadata.get("prUrl"), Some(&"https://example/1".to_string()));
    }

    #[test]
    fn step_status_event_without_metadata_field_deserializes_to_none() {
        let json = r#"{"step_name":"build","candidate_id":"x","status":"failed"}"#;
        let event: StepStatusEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.metadata, None);
    }
}
