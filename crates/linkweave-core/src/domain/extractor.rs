//! Reference extraction: turns the reference-bearing values of a record into
//! dependency edges.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::record::{LocalId, Record, ValueId, ValueKind};
use crate::error::CoreError;

/// Kind of value an edge came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// A direct reference value
    Direct,
    /// Rich text with embedded placeholders
    Embedded,
}

/// Reference from one record to one or more others, contributed by a single value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    /// Record holding the value
    pub source: LocalId,
    /// Referenced records, distinct, in first-seen order
    pub targets: Vec<LocalId>,
    /// The value contributing the reference
    pub value_id: ValueId,
    /// Kind of value
    pub kind: ReferenceKind,
}

impl ReferenceEdge {
    /// Removal cost of each single link of this value.
    ///
    /// A value with many links is cheap per link, so stashing it is
    /// preferred over stashing several single-link values.
    pub fn cost(&self) -> f64 {
        1.0 / self.targets.len().max(1) as f64
    }
}

/// Extract the references of a record, one edge per reference-bearing value.
///
/// `known_ids` are the local ids of the whole batch; a reference to anything
/// else is a dangling reference. Absolute IRIs are not references.
pub fn extract_references(
    record: &Record,
    known_ids: &HashSet<LocalId>,
) -> Result<Vec<ReferenceEdge>, CoreError> {
    let mut edges = Vec::new();

    for value in &record.values {
        let kind = match value.kind {
            ValueKind::DirectReference { .. } => ReferenceKind::Direct,
            ValueKind::EmbeddedReference { .. } => ReferenceKind::Embedded,
            ValueKind::Other { .. } => continue,
        };

        let targets = value.referenced_ids();
        if targets.is_empty() {
            continue;
        }

        if let Some(missing) = targets.iter().find(|t| !known_ids.contains(*t)) {
            return Err(CoreError::DanglingReference {
                source_id: record.local_id.to_string(),
                target_id: missing.to_string(),
                value_id: value.id.to_string(),
            });
        }

        edges.push(ReferenceEdge {
            source: record.local_id.clone(),
            targets,
            value_id: value.id.clone(),
            kind,
        });
    }

    Ok(edges)
}

/// Extract every reference of a batch.
///
/// Fails on the first duplicate local id, then on the first value id used
/// twice within a record, then on the first dangling reference.
pub fn extract_batch(records: &[Record]) -> Result<Vec<ReferenceEdge>, CoreError> {
    let mut known_ids = HashSet::with_capacity(records.len());
    for record in records {
        if !known_ids.insert(record.local_id.clone()) {
            return Err(CoreError::DuplicateLocalId(record.local_id.to_string()));
        }
    }

    for record in records {
        let mut value_ids: HashSet<&ValueId> = HashSet::with_capacity(record.values.len());
        for value in &record.values {
            if !value_ids.insert(&value.id) {
                return Err(CoreError::DuplicateValueId {
                    record_id: record.local_id.to_string(),
                    value_id: value.id.to_string(),
                });
            }
        }
    }

    let mut edges = Vec::new();
    for record in records {
        edges.extend(extract_references(record, &known_ids)?);
    }
    Ok(edges)
}
