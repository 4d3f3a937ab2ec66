use std::hash::Hash;

use crate::domain::graph::DependencyGraph;

/// Outcome of breaking every cycle of a graph
#[derive(Debug, Clone)]
pub struct CycleResolution<O> {
    /// The input graph minus the removed edges; always acyclic
    pub graph: DependencyGraph<O>,
    /// Owners whose edges were removed, in removal order
    pub stashed: Vec<O>,
}

/// Break every cycle by greedily removing the cheapest edges.
///
/// Works one strongly connected component at a time: the lowest-weight edge
/// inside the component is picked (ties go to the earliest inserted edge), all
/// edges of its owner are removed, and only that component is decomposed
/// again. This is a heuristic; it does not search for a minimum feedback edge
/// set.
pub fn resolve_cycles<O: Clone + Eq + Hash>(graph: &DependencyGraph<O>) -> CycleResolution<O> {
    let mut working = graph.clone();
    let mut stashed = Vec::new();

    let mut worklist = working.cyclic_components(None);
    worklist.reverse();

    while let Some(members) = worklist.pop() {
        // Removing a shared owner may already have changed this component.
        let current = working.cyclic_components(Some(members.as_slice()));
        if current.len() != 1 || current[0].len() != members.len() {
            worklist.extend(current.into_iter().rev());
            continue;
        }

        let Some(owner) = working.cheapest_edge_within(&members).map(|e| e.owner.clone()) else {
            continue;
        };

        working.remove_owner(&owner);
        stashed.push(owner);

        let remaining = working.cyclic_components(Some(members.as_slice()));
        worklist.extend(remaining.into_iter().rev());
    }

    CycleResolution {
        graph: working,
        stashed,
    }
}

/// Cyclic components of a graph, for callers that reject cycles outright
pub fn find_cycles<O: Clone + Eq + Hash>(graph: &DependencyGraph<O>) -> Vec<Vec<String>> {
    graph.strongly_connected_components(None)
}
