//! Upload state persistence for Linkweave
//!
//! This crate provides implementations of the
//! [`StatePersistence`](linkweave_core::StatePersistence) port: an in-memory
//! store for tests and embedding, and a file store that keeps one versioned
//! JSON document per batch so an interrupted upload can be resumed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// File-backed persistence and the id to IRI export
pub mod file;

/// In-memory persistence
pub mod memory;

pub use file::{write_id2iri_mapping, FileStatePersistence};
pub use memory::InMemoryStatePersistence;
