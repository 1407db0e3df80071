//! The error taxonomy callers are expected to distinguish.

use thiserror::Error;

/// Errors surfaced by the Service layer and, transitively, by the HTTP
/// surface. Every variant here maps to a stable, user-facing message and
/// (at the HTTP layer) a specific status code.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("migration \"{0}\" not found")]
    MigrationNotFound(String),

    #[error("candidate \"{candidate_id}\" not found in migration \"{migration_id}\"")]
    CandidateNotFound {
        migration_id: String,
        candidate_id: String,
    },

    #[error("candidate \"{id}\" already has status \"{status}\"")]
    CandidateAlreadyRun { id: String, status: String },

    #[error("candidate \"{id}\" is not running")]
    CandidateNotRunning { id: String },

    #[error("run \"{instance_id}\" not found")]
    RunNotFound { instance_id: String },

    #[error("identity error: {0}")]
    Identity(#[from] crate::identity::IdentityError),

    #[error("transient I/O error: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn migration_not_found(id: impl Into<String>) -> Self {
        Self::MigrationNotFound(id.into())
    }

    pub fn candidate_not_found(migration_id: impl Into<String>, candidate_id: impl Into<String>) -> Self {
        Self::CandidateNotFound {
            migration_id: migration_id.into(),
            candidate_id: candidate_id.into(),
        }
    }

    pub fn candidate_already_run(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::CandidateAlreadyRun {
            id: id.into(),
            status: status.into(),
        }
    }

    pub fn candidate_not_running(id: impl Into<String>) -> Self {
        Self::CandidateNotRunning { id: id.into() }
    }

    pub fn run_not_found(instance_id: impl Into<String>) -> Self {
        Self::RunNotFound {
            instance_id: instance_id.into(),
        }
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Whether this error represents the engine/store reporting that the
    /// underlying run is gone — the signal that triggers heal-through-read
    /// / heal-through-start rather than a user-visible failure.
    pub fn is_run_not_found(&self) -> bool {
        matches!(self, Self::RunNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_already_run_message_is_stable() {
        let err = ServiceError::candidate_already_run("repo-a", "running");
        assert_eq!(err.to_string(), "candidate \"repo-a\" already has status \"running\"");
    }

    #[test]
    fn is_run_not_found_only_matches_that_variant() {
        assert!(ServiceError::run_not_found("m::c").is_run_not_found());
        assert!(!ServiceError::migration_not_found("m").is_run_not_found());
    }
}
