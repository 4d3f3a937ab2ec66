use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for the Linkweave engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A value references a local id that is not part of the batch
    #[error("Dangling reference: record '{source_id}' (value '{value_id}') references unknown id '{target_id}'")]
    DanglingReference {
        /// Record that owns the offending value
        source_id: String,
        /// The id that could not be found
        target_id: String,
        /// The offending value
        value_id: String,
    },

    /// The same local id was used for more than one record
    #[error("Duplicate local id: {0}")]
    DuplicateLocalId(String),

    /// A record uses the same value id for more than one value
    #[error("Duplicate value id '{value_id}' in record '{record_id}'")]
    DuplicateValueId {
        /// Record holding the values
        record_id: String,
        /// The reused value id
        value_id: String,
    },

    /// Classes or properties inherit from each other in a cycle
    #[error("Circular ontology dependency between: {}", .involved.join(", "))]
    CircularOntologyDependency {
        /// Identifiers taking part in the cycle, sorted
        involved: Vec<String>,
    },

    /// An internal guarantee was broken; indicates a bug, not bad input
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Persisted state was written by an incompatible version
    #[error("Unsupported upload state version {found} (supported: {supported})")]
    UnsupportedStateVersion {
        /// Version found on disk
        found: u32,
        /// Version this build reads and writes
        supported: u32,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Input/output error
    #[error("Input/output error: {0}")]
    IOError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// True for errors caused by the input batch rather than the environment
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CoreError::DanglingReference { .. }
                | CoreError::DuplicateLocalId(_)
                | CoreError::DuplicateValueId { .. }
                | CoreError::CircularOntologyDependency { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::IOError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}

/// Classification of a failed remote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientErrorKind {
    /// The request did not complete in time
    Timeout,
    /// The connection could not be established or was dropped
    Connection,
    /// 5xx response
    ServerError,
    /// The server rejected the request because the target was modified concurrently
    ConcurrentModification,
    /// 401 / 403
    Authentication,
    /// Any other 4xx
    BadRequest,
    /// 404
    NotFound,
    /// Anything that does not fit the above
    Unexpected,
}

/// Error surfaced by a [`CreationClient`](crate::application::ports::CreationClient)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind:?}{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct ClientError {
    /// What went wrong
    pub kind: ClientErrorKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Message from the server or the transport
    pub message: String,
}

impl ClientError {
    /// Create a new client error
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Attach an HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Classify an HTTP error response.
    ///
    /// 5xx, 409 and bodies asking to "try again later" or reporting a concurrent
    /// modification are retryable; other 4xx are not.
    pub fn from_response(status: u16, body: &str) -> Self {
        let lowered = body.to_lowercase();
        let concurrent = status == 409
            || lowered.contains("try again later")
            || lowered.contains("modified concurrently")
            || (lowered.contains("last modification date") && lowered.contains("ontology"));

        let kind = match status {
            500..=599 => ClientErrorKind::ServerError,
            _ if concurrent => ClientErrorKind::ConcurrentModification,
            401 | 403 => ClientErrorKind::Authentication,
            404 => ClientErrorKind::NotFound,
            400..=499 => ClientErrorKind::BadRequest,
            _ => ClientErrorKind::Unexpected,
        };

        ClientError::new(kind, body).with_status(status)
    }

    /// Whether the request is worth repeating
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ClientErrorKind::Timeout
                | ClientErrorKind::Connection
                | ClientErrorKind::ServerError
                | ClientErrorKind::ConcurrentModification
        )
    }
}
