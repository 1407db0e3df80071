//! Bridges `loom_store::Store` to the narrower `CandidateStatusWriter` seam
//! `loom-engine` expects, so the workflow's deferred-cleanup activity can
//! write store state without `loom-engine` depending on `loom-store`.

use std::sync::Arc;

use async_trait::async_trait;
use loom_core::CandidateStatus;
use loom_engine::CandidateStatusWriter;
use loom_store::Store;

pub struct StoreCandidateStatusWriter {
    store: Arc<dyn Store>,
}

impl StoreCandidateStatusWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CandidateStatusWriter for StoreCandidateStatusWriter {
    async fn set_candidate_status(
        &self,
        migration_id: &str,
        candidate_id: &str,
        status: CandidateStatus,
    ) -> anyhow::Result<()> {
        self.store
            .set_candidate_status(migration_id, candidate_id, status)
            .await
            .map_err(Into::into)
    }
}
