/// Interfaces to the outside world
pub mod ports;

/// Upload events and the default tracing sink
pub mod events;

/// Retry with exponential backoff
pub mod retry;

/// Batch and ontology scheduling
pub mod scheduling;

/// Upload orchestration
pub mod upload_service;
