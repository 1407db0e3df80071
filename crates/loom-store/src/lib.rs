//! The Store port: persistence for migrations and their candidate sets,
//! plus an in-memory reference implementation.
//!
//! The Store is the source of truth for candidate-level status; the
//! durable workflow kernel (`loom-durable`, driven by `loom-engine`) is
//! the source of truth for per-step history. The two are reconciled at
//! read and at start, never kept transactionally consistent.

mod memory;
mod store;

pub use memory::InMemoryStore;
pub use store::{Store, StoreError};
