//! Shared wiring for the scenario tests.

use std::sync::Arc;

use linkweave_core::{RetryPolicy, StatePersistence, UploadConfig, UploadService};
use linkweave_state::InMemoryStatePersistence;
use linkweave_test_utils::{CollectingEventHandler, ScriptedCreationClient};

/// Config with no backoff delay and at most `attempts` attempts per request
pub fn fast_config(attempts: u32) -> UploadConfig {
    UploadConfig {
        retry: RetryPolicy::immediate(attempts),
        ..UploadConfig::default()
    }
}

/// The collaborators of one upload service under test
pub struct Harness {
    /// Fake remote repository
    pub client: Arc<ScriptedCreationClient>,
    /// Where the state lives between runs
    pub persistence: Arc<dyn StatePersistence>,
    /// Every event the service emitted
    pub events: Arc<CollectingEventHandler>,
}

impl Harness {
    /// In-memory persistence and the given client
    pub fn new(client: ScriptedCreationClient) -> Self {
        Self::with_persistence(client, Arc::new(InMemoryStatePersistence::new()))
    }

    /// The given client and persistence; also installs the tracing subscriber
    /// so `RUST_LOG` shows the service's logs
    pub fn with_persistence(client: ScriptedCreationClient, persistence: Arc<dyn StatePersistence>) -> Self {
        linkweave_core::init_tracing();
        Self {
            client: Arc::new(client),
            persistence,
            events: Arc::new(CollectingEventHandler::new()),
        }
    }

    /// A service wired to this harness
    pub fn service(&self, config: UploadConfig) -> UploadService {
        UploadService::new(
            self.client.clone(),
            self.persistence.clone(),
            self.events.clone(),
            config,
        )
        .with_batch_key("scenario")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_config_has_no_delay() {
        let config = fast_config(3);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_for(2).as_millis(), 0);
    }

    #[test]
    fn test_harnesses_share_one_subscriber() {
        let first = Harness::new(ScriptedCreationClient::new());
        let second = Harness::new(ScriptedCreationClient::new());
        assert_eq!(first.client.request_count() + second.client.request_count(), 0);
        assert!(tracing::dispatcher::has_been_set());
    }
}
