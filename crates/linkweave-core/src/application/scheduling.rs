//! Scheduling of record batches and ontology definitions.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::domain::cycles::resolve_cycles;
use crate::domain::extractor::extract_batch;
use crate::domain::graph::DependencyGraph;
use crate::domain::ontology::{order_by_inheritance, OntologyItem};
use crate::domain::record::{LocalId, Record, ValueId};
use crate::domain::schedule::topological_order;
use crate::domain::stash::{Stash, StashItem, StashReason};
use crate::error::CoreError;

/// Creation order of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Records in creation order, stashed values removed
    pub ordered: Vec<Record>,
    /// Values removed to break cycles
    pub stash: Stash,
}

/// Creation order of ontology definitions
#[derive(Debug, Clone, PartialEq)]
pub struct OntologySchedule {
    /// Classes, supers first
    pub classes: Vec<OntologyItem>,
    /// Properties, supers first
    pub properties: Vec<OntologyItem>,
}

/// Owner of a reference edge: the value that contributes it
type EdgeOwner = (LocalId, ValueId);

/// Order a batch for creation.
///
/// Fails without side effects on duplicate local ids and dangling references.
/// Cycles are broken by moving the cheapest values into the stash.
pub fn schedule(records: Vec<Record>) -> Result<Schedule, CoreError> {
    let edges = extract_batch(&records)?;

    let mut graph: DependencyGraph<EdgeOwner> = DependencyGraph::new();
    for record in &records {
        graph.add_node(record.local_id.as_str());
    }
    for edge in &edges {
        let owner = (edge.source.clone(), edge.value_id.clone());
        for target in &edge.targets {
            graph.add_edge(edge.source.as_str(), target.as_str(), edge.cost(), owner.clone());
        }
    }

    let resolution = resolve_cycles(&graph);
    let order = topological_order(&resolution.graph)?;
    debug!(
        records = records.len(),
        edges = graph.edge_count(),
        stashed = resolution.stashed.len(),
        "Batch scheduled"
    );

    let mut stashed_by_source: HashMap<LocalId, HashSet<ValueId>> = HashMap::new();
    for (source, value_id) in resolution.stashed {
        stashed_by_source.entry(source).or_default().insert(value_id);
    }

    let mut by_id: HashMap<String, Record> = records
        .into_iter()
        .map(|r| (r.local_id.0.clone(), r))
        .collect();

    let mut stash = Stash::new();
    let mut ordered = Vec::with_capacity(order.len());
    for id in order {
        let Some(record) = by_id.remove(&id) else {
            return Err(CoreError::InvariantViolation(format!(
                "scheduled id '{id}' has no record"
            )));
        };

        match stashed_by_source.get(&record.local_id) {
            Some(value_ids) => {
                let (stripped, removed) = record.without_values(value_ids);
                for value in removed {
                    stash.add(StashItem::new(stripped.local_id.clone(), value, StashReason::Cycle));
                }
                ordered.push(stripped);
            }
            None => ordered.push(record),
        }
    }

    Ok(Schedule { ordered, stash })
}

/// Order ontology classes and properties so that supers are created first.
///
/// Classes and properties are ordered independently; supers not defined in
/// the batch are assumed to exist. Any inheritance cycle, in either list,
/// fails with [`CoreError::CircularOntologyDependency`] naming everything
/// involved.
pub fn schedule_ontology(
    classes: Vec<OntologyItem>,
    properties: Vec<OntologyItem>,
) -> Result<OntologySchedule, CoreError> {
    let classes = order_by_inheritance(classes);
    let properties = order_by_inheritance(properties);

    match (classes, properties) {
        (Ok(classes), Ok(properties)) => Ok(OntologySchedule { classes, properties }),
        (
            Err(CoreError::CircularOntologyDependency { involved: a }),
            Err(CoreError::CircularOntologyDependency { involved: b }),
        ) => {
            let involved: BTreeSet<String> = a.into_iter().chain(b).collect();
            Err(CoreError::CircularOntologyDependency {
                involved: involved.into_iter().collect(),
            })
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}
