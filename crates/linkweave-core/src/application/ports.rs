//! Ports of the upload engine.
//!
//! The engine talks to the remote repository, to durable storage and to
//! whoever observes progress only through these traits. Implementations
//! live in other crates (`linkweave-client`, `linkweave-state`) or in tests.

use async_trait::async_trait;

use crate::application::events::UploadEvent;
use crate::domain::record::{Record, ServerIri, Value};
use crate::domain::upload_state::UploadState;
use crate::error::{ClientError, CoreError};

/// Creates records and patches values on the remote repository
#[async_trait]
pub trait CreationClient: Send + Sync {
    /// Create a record and return its IRI.
    ///
    /// Every reference in the record has already been replaced by an IRI.
    async fn create(&self, record: &Record) -> Result<ServerIri, ClientError>;

    /// Attach a value to an existing record
    async fn patch(&self, iri: &ServerIri, value: &Value) -> Result<(), ClientError>;
}

/// Durable storage of the upload state of one batch
#[async_trait]
pub trait StatePersistence: Send + Sync {
    /// Save the state, replacing any previous one
    async fn save(&self, state: &UploadState) -> Result<(), CoreError>;

    /// Load the saved state, if any
    async fn load(&self) -> Result<Option<UploadState>, CoreError>;

    /// Delete the saved state
    async fn clear(&self) -> Result<(), CoreError>;
}

/// Supplies the records of a batch
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// All records of the batch
    async fn records(&self) -> Result<Vec<Record>, CoreError>;
}

#[async_trait]
impl RecordSource for Vec<Record> {
    async fn records(&self) -> Result<Vec<Record>, CoreError> {
        Ok(self.clone())
    }
}

/// Receives upload events
#[async_trait]
pub trait UploadEventHandler: Send + Sync {
    /// Handle an event
    async fn handle(&self, event: &UploadEvent) -> Result<(), CoreError>;
}
