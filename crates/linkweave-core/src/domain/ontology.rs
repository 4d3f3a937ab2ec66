//! Inheritance ordering for ontology classes and properties.
//!
//! Uses the same graph and scheduler as record uploads, but a cycle here is
//! a fatal input error: a class can never be created before its own super-class.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::cycles::find_cycles;
use crate::domain::graph::DependencyGraph;
use crate::domain::schedule::topological_order;
use crate::error::CoreError;

/// A class or property definition together with the names it inherits from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyItem {
    /// Name of the class or property
    pub id: String,
    /// Super-classes or super-properties
    #[serde(default)]
    pub supers: Vec<String>,
}

impl OntologyItem {
    /// Create an item
    pub fn new(id: impl Into<String>, supers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id: id.into(),
            supers: supers.into_iter().map(Into::into).collect(),
        }
    }
}

/// Build the inheritance graph of a batch of items.
///
/// Supers outside the batch are assumed to exist on the server and add no edge.
pub fn inheritance_graph(items: &[OntologyItem]) -> Result<DependencyGraph<(String, String)>, CoreError> {
    let mut graph = DependencyGraph::new();
    for item in items {
        if !graph.add_node(item.id.clone()) {
            return Err(CoreError::DuplicateLocalId(item.id.clone()));
        }
    }

    for item in items {
        let mut seen = HashSet::new();
        for parent in &item.supers {
            if graph.contains_node(parent) && seen.insert(parent) {
                graph.add_edge(&item.id, parent, 1.0, (item.id.clone(), parent.clone()));
            }
        }
    }
    Ok(graph)
}

/// Order items so that every super comes before its subs.
///
/// Any cycle fails with [`CoreError::CircularOntologyDependency`] naming every
/// item involved, sorted.
pub fn order_by_inheritance(items: Vec<OntologyItem>) -> Result<Vec<OntologyItem>, CoreError> {
    let graph = inheritance_graph(&items)?;

    let involved: BTreeSet<String> = find_cycles(&graph).into_iter().flatten().collect();
    if !involved.is_empty() {
        return Err(CoreError::CircularOntologyDependency {
            involved: involved.into_iter().collect(),
        });
    }

    let order = topological_order(&graph)?;
    let mut by_id: HashMap<String, OntologyItem> =
        items.into_iter().map(|item| (item.id.clone(), item)).collect();
    Ok(order.into_iter().filter_map(|id| by_id.remove(&id)).collect())
}
