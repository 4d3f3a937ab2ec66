use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use linkweave_core::{CoreError, StatePersistence, UploadState};

/// In-memory state persistence.
///
/// The state is kept as its serialized JSON, so loading goes through the
/// same version check as the file store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatePersistence {
    slot: Arc<RwLock<Option<String>>>,
}

impl InMemoryStatePersistence {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `state`
    pub fn with_state(state: &UploadState) -> Result<Self, CoreError> {
        Ok(Self {
            slot: Arc::new(RwLock::new(Some(state.to_json()?))),
        })
    }

    /// Whether a state is stored
    pub async fn has_state(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// The raw stored JSON
    pub async fn raw(&self) -> Option<String> {
        self.slot.read().await.clone()
    }
}

#[async_trait]
impl StatePersistence for InMemoryStatePersistence {
    async fn save(&self, state: &UploadState) -> Result<(), CoreError> {
        let json = state.to_json()?;
        *self.slot.write().await = Some(json);
        debug!(batch = %state.batch_key, "Upload state stored in memory");
        Ok(())
    }

    async fn load(&self) -> Result<Option<UploadState>, CoreError> {
        match self.slot.read().await.as_deref() {
            Some(json) => Ok(Some(UploadState::from_json(json)?)),
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<(), CoreError> {
        *self.slot.write().await = None;
        Ok(())
    }
}
