use std::collections::HashMap;

use loom_core::Candidate;
use serde::{Deserialize, Serialize};

/// The payload handed to a migrator when a step is dispatched.
///
/// `callback_id` is always the workflow id so the migrator's eventual
/// `POST /event/{instanceId}` call lands back on the run that dispatched it.
/// `candidate` carries the full candidate object, not just its id: its
/// `metadata` is the workflow's current merged view (operator inputs at
/// start, refined by any `update-inputs` signals since) — this is what
/// lets an operator edit mid-run reach the next dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchStepRequest {
    pub migration_id: String,
    pub step_name: String,
    pub candidate: Candidate,
    pub config: HashMap<String, String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
    pub callback_id: String,
    pub event_name: String,
    pub migrator_app: String,
    pub migrator_url: String,
}
