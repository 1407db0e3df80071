use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::dispatch::DispatchStepRequest;
use crate::notifier::{MigratorNotifier, NotifierError};

const CHANNEL_CAPACITY: usize = 256;

/// In-process publish/subscribe notifier, keyed by `migrator_app`.
///
/// Stands in for a real pub/sub transport (Redis streams, NATS, …) in a
/// single process: a migrator "subscribes" by calling [`subscribe`], and
/// every subsequent dispatch to its app name is broadcast to all current
/// subscribers. A dispatch made before anything has subscribed is a
/// no-op delivery — the caller observes it as success; nothing downstream
/// depended on synchronous acknowledgement, per the at-least-once
/// contract the workflow is already built to tolerate.
#[derive(Clone)]
pub struct PubSubMigratorNotifier {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<DispatchStepRequest>>>>,
}

impl PubSubMigratorNotifier {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to dispatches for a single migrator app, creating its
    /// topic if this is the first subscriber.
    pub fn subscribe(&self, migrator_app: &str) -> broadcast::Receiver<DispatchStepRequest> {
        let mut channels = self.channels.write();
        channels
            .entry(migrator_app.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Default for PubSubMigratorNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MigratorNotifier for PubSubMigratorNotifier {
    async fn dispatch_step(&self, request: DispatchStepRequest) -> Result<(), NotifierError> {
        let channels = self.channels.read();
        if let Some(sender) = channels.get(&request.migrator_app) {
            // An error here means there are currently no subscribers;
            // that is not a delivery failure, just nobody listening yet.
            let _ = sender.send(request);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    use loom_core::{Candidate, CandidateStatus};

    fn request(migrator_app: &str) -> DispatchStepRequest {
        DispatchStepRequest {
            migration_id: "m1".to_string(),
            step_name: "build".to_string(),
            candidate: Candidate {
                id: "c1".to_string(),
                kind: "repo".to_string(),
                metadata: StdHashMap::new(),
                steps: None,
                file_groups: vec![],
                status: CandidateStatus::Running,
            },
            config: StdHashMap::new(),
            step_type: None,
            callback_id: "m1::c1".to_string(),
            event_name: "step-completed:build:c1".to_string(),
            migrator_app: migrator_app.to_string(),
            migrator_url: "https://migrator.example".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_to_subscriber_of_matching_app() {
        let notifier = PubSubMigratorNotifier::new();
        let mut rx = notifier.subscribe("builder");

        notifier.dispatch_step(request("builder")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.migrator_app, "builder");
    }

    #[tokio::test]
    async fn does_not_deliver_to_other_apps() {
        let notifier = PubSubMigratorNotifier::new();
        let mut rx = notifier.subscribe("other");

        notifier.dispatch_step(request("builder")).await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_without_subscribers_still_succeeds() {
        let notifier = PubSubMigratorNotifier::new();
        notifier.dispatch_step(request("nobody-home")).await.unwrap();
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive() {
        let notifier = PubSubMigratorNotifier::new();
        let mut rx1 = notifier.subscribe("builder");
        let mut rx2 = notifier.subscribe("builder");

        notifier.dispatch_step(request("builder")).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().candidate.id, "c1");
        assert_eq!(rx2.recv().await.unwrap().candidate.id, "c1");
    }
}
