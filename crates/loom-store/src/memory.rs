//! An in-memory reference implementation of [`Store`]. A concrete
//! key/value backing is out of scope here; this plays the same role
//! the durable kernel's in-memory event store plays for tests and local
//! runs — same locking pattern, adapted to the Migration/Candidate shape.

use std::collections::HashMap;

use async_trait::async_trait;
use loom_core::{Candidate, CandidateStatus, Migration};
use parking_lot::RwLock;
use tracing::instrument;

use crate::store::{Store, StoreError};

#[derive(Default)]
struct Inner {
    /// `migration:<id>` in the persisted-state layout.
    migrations: HashMap<String, Migration>,
    /// `migrations:index`: append-if-absent, insertion order.
    index: Vec<String>,
}

/// In-memory [`Store`]. Cheap to clone via `Arc` at the call site; holds
/// its own lock internally so callers don't need to wrap it themselves.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    #[instrument(skip(self, migration), fields(migration_id = %migration.id))]
    async fn save(&self, mut migration: Migration) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.migrations.get(&migration.id) {
            migration.created_at = existing.created_at;
        } else {
            inner.index.push(migration.id.clone());
        }
        inner.migrations.insert(migration.id.clone(), migration);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<Migration>, StoreError> {
        Ok(self.inner.read().migrations.get(id).cloned())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Migration>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .index
            .iter()
            .filter_map(|id| inner.migrations.get(id).cloned())
            .collect())
    }

    #[instrument(skip(self))]
    async fn set_candidate_status(
        &self,
        migration_id: &str,
        candidate_id: &str,
        status: CandidateStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let migration = inner
            .migrations
            .get_mut(migration_id)
            .ok_or_else(|| StoreError::migration_not_found(migration_id))?;
        let candidate = migration
            .candidates
            .iter_mut()
            .find(|c| c.id == candidate_id)
            .ok_or_else(|| StoreError::candidate_not_found(migration_id, candidate_id))?;
        candidate.status = status;
        Ok(())
    }

    #[instrument(skip(self, candidates))]
    async fn save_candidates(
        &self,
        migration_id: &str,
        candidates: Vec<Candidate>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let migration = inner
            .migrations
            .get_mut(migration_id)
            .ok_or_else(|| StoreError::migration_not_found(migration_id))?;
        migration.candidates = candidates;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_candidates(&self, migration_id: &str) -> Result<Vec<Candidate>, StoreError> {
        let inner = self.inner.read();
        let migration = inner
            .migrations
            .get(migration_id)
            .ok_or_else(|| StoreError::migration_not_found(migration_id))?;
        Ok(migration.candidates.clone())
    }
}
