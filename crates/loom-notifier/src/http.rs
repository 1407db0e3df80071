use async_trait::async_trait;

use crate::dispatch::DispatchStepRequest;
use crate::notifier::{MigratorNotifier, NotifierError};

/// Delivers dispatches with a direct HTTP POST to `migrator_url`.
///
/// Grounded in the same request/response shape every provider client in
/// this workspace uses: build once, reuse the client, check status before
/// trusting the body.
pub struct HttpMigratorNotifier {
    client: reqwest::Client,
}

impl HttpMigratorNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMigratorNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigratorNotifier for HttpMigratorNotifier {
    async fn dispatch_step(&self, request: DispatchStepRequest) -> Result<(), NotifierError> {
        let migrator_app = request.migrator_app.clone();
        let url = format!("{}/steps", request.migrator_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifierError::Transient {
                migrator_app: migrator_app.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return if status.is_client_error() {
                Err(NotifierError::Rejected {
                    migrator_app,
                    message: format!("{status}: {body}"),
                })
            } else {
                Err(NotifierError::Transient {
                    migrator_app,
                    message: format!("{status}: {body}"),
                })
            };
        }

        Ok(())
    }
}
