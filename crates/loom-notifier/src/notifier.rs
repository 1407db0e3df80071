use async_trait::async_trait;
use thiserror::Error;

use crate::dispatch::DispatchStepRequest;

/// Errors a notifier can surface back to the activity that invoked it.
///
/// Kept independent of `loom_durable::ActivityError` so this crate has no
/// dependency on the execution engine; the engine crate converts between
/// the two at the one seam that needs both.
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("migrator app {migrator_app} is not registered with this notifier")]
    UnknownMigrator { migrator_app: String },

    #[error("migrator {migrator_app} rejected dispatch: {message}")]
    Rejected { migrator_app: String, message: String },

    #[error("transient failure delivering to {migrator_app}: {message}")]
    Transient { migrator_app: String, message: String },
}

impl NotifierError {
    /// Whether retrying the same dispatch might succeed. Rejections are a
    /// migrator telling us "no"; transient failures and unknown-migrator
    /// gaps might resolve on their own (the latter if the migrator
    /// subscribes after the step was first scheduled).
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NotifierError::Rejected { .. })
    }
}

/// Delivers a dispatch to whichever migrator owns a step.
///
/// Delivery is at-least-once: the workflow upserts by (stepName,
/// candidateId) so a migrator that receives the same dispatch twice (or
/// whose completion event arrives twice) does not corrupt step state.
#[async_trait]
pub trait MigratorNotifier: Send + Sync {
    async fn dispatch_step(&self, request: DispatchStepRequest) -> Result<(), NotifierError>;
}
