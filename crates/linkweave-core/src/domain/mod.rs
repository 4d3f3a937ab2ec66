/// Records, values and identifiers
pub mod record;

/// Local id to server IRI mapping
pub mod iri_resolver;

/// Reference extraction
pub mod extractor;

/// Dependency graph
pub mod graph;

/// Cycle detection and breaking
pub mod cycles;

/// Topological ordering
pub mod schedule;

/// Values withheld from creation requests
pub mod stash;

/// Resumable batch state
pub mod upload_state;

/// Ontology inheritance ordering
pub mod ontology;
