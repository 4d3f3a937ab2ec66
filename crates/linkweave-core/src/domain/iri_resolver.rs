use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::record::{LocalId, ServerIri};

/// Mapping from local ids to the IRIs the server assigned on creation.
///
/// Grows monotonically while records are created; the stash pass only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IriResolver {
    lookup: BTreeMap<LocalId, ServerIri>,
}

impl IriResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the IRI of a created record.
    ///
    /// Returns the previous IRI if the id was already known, which only
    /// happens when a resumed run re-creates a record.
    pub fn insert(&mut self, id: LocalId, iri: ServerIri) -> Option<ServerIri> {
        self.lookup.insert(id, iri)
    }

    /// IRI of a local id, if it has been created
    pub fn get(&self, id: &LocalId) -> Option<&ServerIri> {
        self.lookup.get(id)
    }

    /// Whether the id has an IRI
    pub fn contains(&self, id: &LocalId) -> bool {
        self.lookup.contains_key(id)
    }

    /// Resolve every id or return the ones that are missing
    pub fn resolve_all<'a, I>(&self, ids: I) -> Result<Vec<ServerIri>, Vec<LocalId>>
    where
        I: IntoIterator<Item = &'a LocalId>,
    {
        let mut resolved = Vec::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.lookup.get(id) {
                Some(iri) => resolved.push(iri.clone()),
                None => missing.push(id.clone()),
            }
        }
        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(missing)
        }
    }

    /// Number of known ids
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// True when nothing has been created yet
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// The full mapping, ordered by local id
    pub fn lookup(&self) -> &BTreeMap<LocalId, ServerIri> {
        &self.lookup
    }
}
