//! Migration definitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::candidate::Candidate;

/// An operator-provided input required before a candidate's run may start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct InputSpec {
    pub name: String,
    pub label: String,
    pub description: String,
}

/// One stage of a [`Migration`], executed by a migrator app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StepDefinition {
    pub name: String,
    pub migrator_app: String,
    /// Recognized key: `instructions`. Anything else is passed through
    /// to the migrator verbatim.
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
}

impl StepDefinition {
    pub fn instructions(&self) -> Option<&str> {
        self.config.get("instructions").map(String::as_str)
    }
}

/// A named, versioned pipeline of steps owned by a migrator.
///
/// `id` is the migrator-owned stable slug; `created_at` is fixed at first
/// announcement and preserved by every subsequent upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Migration {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<StepDefinition>,
    pub required_inputs: Vec<InputSpec>,
    pub migrator_url: String,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl Migration {
    /// Find a step definition by name, case-sensitive, unique within the
    /// migration per the data model invariant.
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Find a candidate by id.
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Merge an incoming announcement into this migration in place,
    /// preserving `created_at` and the existing candidate set. `other.id`
    /// must already equal `self.id`.
    pub fn apply_announcement(&mut self, other: Migration) {
        debug_assert_eq!(self.id, other.id);
        self.name = other.name;
        self.description = other.description;
        self.required_inputs = other.required_inputs;
        self.steps = other.steps;
        self.migrator_url = other.migrator_url;
        // created_at and candidates are intentionally left untouched.
    }
}
