//! Candidate definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::migration::StepDefinition;

/// Run status of a candidate as recorded by the Store. This is the
/// candidate-level source of truth; per-step history lives in the
/// workflow instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    NotStarted,
    Running,
    Completed,
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// A discovery artifact grouping files relevant to a candidate. Opaque to
/// the orchestration kernel; passed through to the migrator as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct FileGroup {
    pub name: String,
    pub files: Vec<String>,
}

/// A unit of work (typically a repository) a migration is applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Candidate {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Overrides the migration's steps for this candidate only, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepDefinition>>,
    #[serde(default)]
    pub file_groups: Vec<FileGroup>,
    #[serde(default = "CandidateStatus::not_started_default")]
    pub status: CandidateStatus,
}

impl CandidateStatus {
    fn not_started_default() -> Self {
        CandidateStatus::NotStarted
    }
}

impl Candidate {
    /// The steps that actually run for this candidate: its own override
    /// if present, else the migration's steps.
    pub fn effective_steps<'a>(&'a self, migration_steps: &'a [StepDefinition]) -> &'a [StepDefinition] {
        self.steps.as_deref().unwrap_or(migration_steps)
    }

    /// Merge operator-supplied inputs over a copy of this candidate's
    /// metadata; inputs override on key collision.
    pub fn merged_metadata(&self, inputs: &HashMap<String, String>) -> HashMap<String, String> {
        let mut merged = self.metadata.clone();
        for (k, v) in inputs {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}
