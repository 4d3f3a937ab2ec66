//!
//! Linkweave Core - dependency resolution and upload scheduling
//!
//! This crate turns a batch of interlinked records into a creation order the
//! remote repository accepts, withholds the references that would break that
//! order, and drives the upload through ports that other crates implement.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - records, graphs and upload state
pub mod domain;

/// Application services - scheduling and orchestration
pub mod application;

/// Run configuration
pub mod config;

/// Error types
pub mod error;

// Re-export key types
pub use config::{RetryPolicy, UploadConfig};
pub use error::{ClientError, ClientErrorKind, CoreError};

pub use domain::extractor::{extract_batch, extract_references, ReferenceEdge, ReferenceKind};
pub use domain::graph::{DependencyGraph, GraphEdge};
pub use domain::cycles::{find_cycles, resolve_cycles, CycleResolution};
pub use domain::iri_resolver::IriResolver;
pub use domain::ontology::OntologyItem;
pub use domain::record::{is_absolute_iri, LocalId, Record, ServerIri, Value, ValueId, ValueKind};
pub use domain::schedule::topological_order;
pub use domain::stash::{Stash, StashItem, StashReason, UnresolvedReason, UnresolvedStashEntry};
pub use domain::upload_state::{BatchPhase, FailedRecord, RecordStatus, UploadState, STATE_FORMAT_VERSION};

pub use application::events::{TracingEventHandler, UploadEvent};
pub use application::ports::{CreationClient, RecordSource, StatePersistence, UploadEventHandler};
pub use application::retry::retry_with_backoff;
pub use application::scheduling::{schedule, schedule_ontology, OntologySchedule, Schedule};
pub use application::upload_service::{UploadReport, UploadService};

/// Re-exported so callers can build a token without depending on `tokio-util`
pub use tokio_util::sync::CancellationToken;

/// Initialize tracing for binaries and tests.
///
/// The library itself never installs a subscriber.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
