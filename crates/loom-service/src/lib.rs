//! The Service layer: the ten migration use cases, composed from the
//! Store, Execution Engine, and Migrator Notifier ports. This
//! is the boundary `loom-api` calls into; nothing downstream of here
//! knows about HTTP, and nothing upstream of here knows how a run is
//! actually driven.

mod service;
mod status_writer;

pub use service::{CandidateRunStatus, CandidateStepsView, Service};
pub use status_writer::StoreCandidateStatusWriter;
