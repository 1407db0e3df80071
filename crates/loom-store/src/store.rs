//! The Store port: persistence for migrations and their candidates,
//! keyed by migration id.

use async_trait::async_trait;
use loom_core::{Candidate, CandidateStatus, Migration};

/// Failure kinds a [`Store`] implementation may surface. Only two kinds
/// are distinguished: a caller-retryable transient failure, and a
/// distinct not-found kind the Service translates into its own
/// `MigrationNotFound`/`CandidateNotFound` errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("migration \"{0}\" not found")]
    MigrationNotFound(String),

    #[error("candidate \"{candidate_id}\" not found in migration \"{migration_id}\"")]
    CandidateNotFound {
        migration_id: String,
        candidate_id: String,
    },

    #[error("transient store error: {0}")]
    Transient(String),
}

impl StoreError {
    pub fn migration_not_found(id: impl Into<String>) -> Self {
        Self::MigrationNotFound(id.into())
    }

    pub fn candidate_not_found(migration_id: impl Into<String>, candidate_id: impl Into<String>) -> Self {
        Self::CandidateNotFound {
            migration_id: migration_id.into(),
            candidate_id: candidate_id.into(),
        }
    }
}

/// Persistence for migrations and their candidate sets.
///
/// All reconciliation above this port is idempotent; no transactional
/// guarantees across keys are required of an implementation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Upsert by id. If a migration with this id already exists, its
    /// `created_at` is preserved regardless of what `migration.created_at`
    /// holds; every other field, including `candidates`, is overwritten
    /// with what's given. Field-level merging (preserving prior
    /// candidates, `name`, etc.) is the Service's `announce` use case's
    /// job, not this port's.
    async fn save(&self, migration: Migration) -> Result<(), StoreError>;

    /// Dense read, including embedded candidates.
    async fn get(&self, id: &str) -> Result<Option<Migration>, StoreError>;

    /// All migrations, via the append-if-absent `migrations:index`.
    /// Order is insertion order.
    async fn list(&self) -> Result<Vec<Migration>, StoreError>;

    /// Last-writer-wins update of one candidate's status.
    async fn set_candidate_status(
        &self,
        migration_id: &str,
        candidate_id: &str,
        status: CandidateStatus,
    ) -> Result<(), StoreError>;

    /// Replace the candidate set wholesale, mirroring it onto the
    /// migration object so `get()` observes both.
    async fn save_candidates(
        &self,
        migration_id: &str,
        candidates: Vec<Candidate>,
    ) -> Result<(), StoreError>;

    /// The current candidate set with up to date status.
    async fn get_candidates(&self, migration_id: &str) -> Result<Vec<Candidate>, StoreError>;
}
