//! Deterministic workflow-id and event-name derivation.
//!
//! Because these names are derivable from public identifiers alone,
//! migrators can raise events without a server-issued callback token —
//! they only need the workflow-id (delivered in the dispatch request)
//! and the step/candidate names they already know.

/// Reserved separator between migration-id and candidate-id in a
/// workflow-id. Two characters, chosen so it cannot appear inside a
/// valid migration or candidate id (neither of which may contain `:`).
const SEP: &str = "::";

/// Errors constructing or parsing identity strings.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("migration id must not be empty")]
    EmptyMigrationId,

    #[error("candidate id must not be empty")]
    EmptyCandidateId,

    #[error("migration id {0:?} must not contain the reserved separator \"{SEP}\"")]
    MigrationIdContainsSeparator(String),

    #[error("candidate id {0:?} must not contain the reserved separator \"{SEP}\"")]
    CandidateIdContainsSeparator(String),

    #[error("workflow id {0:?} is not a valid migration{SEP}candidate pair")]
    Malformed(String),
}

fn validate(migration_id: &str, candidate_id: &str) -> Result<(), IdentityError> {
    if migration_id.is_empty() {
        return Err(IdentityError::EmptyMigrationId);
    }
    if candidate_id.is_empty() {
        return Err(IdentityError::EmptyCandidateId);
    }
    if migration_id.contains(SEP) {
        return Err(IdentityError::MigrationIdContainsSeparator(
            migration_id.to_string(),
        ));
    }
    if candidate_id.contains(SEP) {
        return Err(IdentityError::CandidateIdContainsSeparator(
            candidate_id.to_string(),
        ));
    }
    Ok(())
}

/// Build the workflow instance id for a `(migration_id, candidate_id)`
/// pair.
pub fn workflow_id(migration_id: &str, candidate_id: &str) -> Result<String, IdentityError> {
    validate(migration_id, candidate_id)?;
    Ok(format!("{migration_id}{SEP}{candidate_id}"))
}

/// Recover `(migration_id, candidate_id)` from a workflow id produced by
/// [`workflow_id`]. Rejects ambiguous input rather than guessing.
pub fn parse_workflow_id(id: &str) -> Result<(String, String), IdentityError> {
    let mut parts = id.splitn(2, SEP);
    let migration_id = parts.next().unwrap_or_default();
    let candidate_id = match parts.next() {
        Some(rest) => rest,
        None => return Err(IdentityError::Malformed(id.to_string())),
    };
    validate(migration_id, candidate_id)?;
    // splitn(2, ..) means candidate_id may still legally contain SEP only
    // if migration_id could also have absorbed it differently; reject any
    // id where the remainder still contains the separator, since that
    // would make the pair ambiguous on round-trip.
    if candidate_id.contains(SEP) {
        return Err(IdentityError::CandidateIdContainsSeparator(
            candidate_id.to_string(),
        ));
    }
    Ok((migration_id.to_string(), candidate_id.to_string()))
}

/// Step-completion event name.
pub fn step_completed_event(step_name: &str, candidate_id: &str) -> String {
    format!("step-completed:{step_name}:{candidate_id}")
}

/// PR-opened intermediate event name.
pub fn pr_opened_event(step_name: &str, candidate_id: &str) -> String {
    format!("pr-opened:{step_name}:{candidate_id}")
}

/// Retry-step event name.
pub fn retry_step_event(step_name: &str, candidate_id: &str) -> String {
    format!("retry-step:{step_name}:{candidate_id}")
}

/// Update-inputs event name.
pub fn update_inputs_event(candidate_id: &str) -> String {
    format!("update-inputs:{candidate_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_ids() {
        let id = workflow_id("migrate-deps", "repo-a").unwrap();
        assert_eq!(id, "migrate-deps::repo-a");
        assert_eq!(
            parse_workflow_id(&id).unwrap(),
            ("migrate-deps".to_string(), "repo-a".to_string())
        );
    }

    #[test]
    fn round_trips_ids_with_colons() {
        // single colons are fine, only the double-colon separator is reserved
        let id = workflow_id("org:migrate-deps", "github:repo-a").unwrap();
        assert_eq!(
            parse_workflow_id(&id).unwrap(),
            ("org:migrate-deps".to_string(), "github:repo-a".to_string())
        );
    }

    #[test]
    fn rejects_separator_in_migration_id() {
        assert_eq!(
            workflow_id("bad::mig", "cand").unwrap_err(),
            IdentityError::MigrationIdContainsSeparator("bad::mig".to_string())
        );
    }

    #[test]
    fn rejects_separator_in_candidate_id() {
        assert_eq!(
            workflow_id("mig", "bad::cand").unwrap_err(),
            IdentityError::CandidateIdContainsSeparator("bad::cand".to_string())
        );
    }

    #[test]
    fn rejects_empty_ids() {
        assert_eq!(
            workflow_id("", "cand").unwrap_err(),
            IdentityError::EmptyMigrationId
        );
        assert_eq!(
            workflow_id("mig", "").unwrap_err(),
            IdentityError::EmptyCandidateId
        );
    }

    #[test]
    fn rejects_malformed_parse_input() {
        assert!(matches!(
            parse_workflow_id("no-separator-here"),
            Err(IdentityError::Malformed(_))
        ));
    }

    #[test]
    fn event_names_are_deterministic() {
        assert_eq!(step_completed_event("build", "repo-a"), "step-completed:build:repo-a");
        assert_eq!(pr_opened_event("build", "repo-a"), "pr-opened:build:repo-a");
        assert_eq!(retry_step_event("build", "repo-a"), "retry-step:build:repo-a");
        assert_eq!(update_inputs_event("repo-a"), "update-inputs:repo-a");
    }
}
