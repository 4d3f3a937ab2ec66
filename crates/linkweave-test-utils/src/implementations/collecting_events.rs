//! Event sink that keeps every event it receives.

use async_trait::async_trait;
use parking_lot::Mutex;

use linkweave_core::{CoreError, UploadEvent, UploadEventHandler};

/// Records every event for later inspection
#[derive(Debug, Default)]
pub struct CollectingEventHandler {
    events: Mutex<Vec<UploadEvent>>,
}

impl CollectingEventHandler {
    /// Creates an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, in order
    pub fn events(&self) -> Vec<UploadEvent> {
        self.events.lock().clone()
    }

    /// Event type names received so far, in order
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(UploadEvent::event_type).collect()
    }

    /// Number of events with the given type name
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    /// Forget everything received so far
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl UploadEventHandler for CollectingEventHandler {
    async fn handle(&self, event: &UploadEvent) -> Result<(), CoreError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
