//! The Migrator Notifier port and Dry-Run port.
//!
//! A notifier delivers a [`DispatchStepRequest`] to whichever migrator
//! owns a step; delivery is at-least-once and the workflow tolerates
//! duplicates, so implementations here do not need delivery guarantees
//! beyond "try once, surface failure".

mod dispatch;
mod dryrun;
mod http;
mod notifier;
mod pubsub;

pub use dispatch::DispatchStepRequest;
pub use dryrun::{
    first_dispatchable_step, DryRunError, DryRunPort, DryRunRequest, DryRunResult,
    DryRunStepResult, FileDiff, HttpDryRunClient,
};
pub use http::HttpMigratorNotifier;
pub use notifier::{MigratorNotifier, NotifierError};
pub use pubsub::PubSubMigratorNotifier;
