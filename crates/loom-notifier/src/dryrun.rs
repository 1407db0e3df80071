use std::collections::HashSet;

use async_trait::async_trait;
use loom_core::migration::StepDefinition;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DryRunRequest {
    pub migration_id: String,
    pub candidate: String,
    pub steps: Vec<StepDefinition>,
    pub migrator_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct FileDiff {
    pub path: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DryRunStepResult {
    pub step_name: String,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileDiff>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DryRunResult {
    pub steps: Vec<DryRunStepResult>,
}

#[derive(Debug, Error)]
pub enum DryRunError {
    #[error("no dispatchable migrator among the candidate's steps")]
    NoDispatchableMigrator,

    #[error("dry-run request rejected: {0}")]
    Rejected(String),

    #[error("transient failure performing dry-run: {0}")]
    Transient(String),
}

/// Finds the first step whose `migrator_app` is not in `reserved` — the
/// migrator a dry-run request is forwarded to. Steps are otherwise
/// addressed to whichever migrator implements them; "reserved" names
/// identify migrator apps that never take dry-run traffic directly (for
/// example ones that only perform bookkeeping the orchestrator itself
/// already renders).
pub fn first_dispatchable_step<'a>(
    steps: &'a [StepDefinition],
    reserved: &HashSet<String>,
) -> Option<&'a StepDefinition> {
    steps.iter().find(|s| !reserved.contains(&s.migrator_app))
}

/// Forwards a simulated step-sequence request to a migrator and returns
/// per-step file diffs.
#[async_trait]
pub trait DryRunPort: Send + Sync {
    async fn dry_run(&self, request: DryRunRequest) -> Result<DryRunResult, DryRunError>;
}

/// HTTP implementation: posts the request to the resolved migrator's
/// dry-run endpoint (`{migrator_url}/dry-run`) and parses its response.
pub struct HttpDryRunClient {
    client: reqwest::Client,
    reserved_migrators: HashSet<String>,
}

impl HttpDryRunClient {
    pub fn new(reserved_migrators: HashSet<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            reserved_migrators,
        }
    }

    fn resolve_target<'a>(&self, steps: &'a [StepDefinition]) -> Option<&'a StepDefinition> {
        first_dispatchable_step(steps, &self.reserved_migrators)
    }
}

#[derive(Serialize)]
struct DryRunWireRequest<'a> {
    migration_id: &'a str,
    candidate: &'a str,
    steps: &'a [StepDefinition],
}

#[async_trait]
impl DryRunPort for HttpDryRunClient {
    async fn dry_run(&self, request: DryRunRequest) -> Result<DryRunResult, DryRunError> {
        self.resolve_target(&request.steps)
            .ok_or(DryRunError::NoDispatchableMigrator)?;

        let url = format!("{}/dry-run", request.migrator_url);
        let wire = DryRunWireRequest {
            migration_id: &request.migration_id,
            candidate: &request.candidate,
            steps: &request.steps,
        };

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&wire)
            .send()
            .await
            .map_err(|e| DryRunError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return if status.is_client_error() {
                Err(DryRunError::Rejected(format!("{status}: {body}")))
            } else {
                Err(DryRunError::Transient(format!("{status}: {body}")))
            };
        }

        response
            .json::<DryRunResult>()
            .await
            .map_err(|e| DryRunError::Transient(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn step(name: &str, migrator_app: &str) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            migrator_app: migrator_app.to_string(),
            config: HashMap::new(),
            step_type: None,
        }
    }

    #[test]
    fn skips_reserved_migrators() {
        let steps = vec![step("a", "bookkeeper"), step("b", "real-migrator")];
        let mut reserved = HashSet::new();
        reserved.insert("bookkeeper".to_string());

        let found = first_dispatchable_step(&steps, &reserved).unwrap();
        assert_eq!(found.name, "b");
    }

    #[test]
    fn none_when_every_migrator_is_reserved() {
        let steps = vec![step("a", "bookkeeper")];
        let mut reserved = HashSet::new();
        reserved.insert("bookkeeper".to_string());

        assert!(first_dispatchable_step(&steps, &reserved).is_none());
    }

    #[test]
    fn empty_steps_has_no_dispatch_target() {
        let steps: Vec<StepDefinition> = vec![];
        assert!(first_dispatchable_step(&steps, &HashSet::new()).is_none());
    }
}
