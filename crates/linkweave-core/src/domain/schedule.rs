use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::hash::Hash;

use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::domain::graph::DependencyGraph;
use crate::error::CoreError;

/// Order the nodes of an acyclic graph so every edge's target comes before its source.
///
/// Kahn's algorithm over out-degrees: a node is ready once everything it
/// references is placed. Among ready nodes the earliest inserted wins. Nodes
/// without any edge are appended afterwards in insertion order.
///
/// A remaining cycle means the caller skipped cycle resolution and is reported
/// as [`CoreError::InvariantViolation`].
pub fn topological_order<O: Clone + Eq + Hash>(
    graph: &DependencyGraph<O>,
) -> Result<Vec<String>, CoreError> {
    let g = graph.as_petgraph();
    // Nodes are never removed, so indices run 0..node_count in insertion order.
    let n = g.node_count();
    let mut remaining = vec![0usize; n];
    let mut connected = vec![false; n];
    for node in g.node_indices() {
        let out = g.edges_directed(node, Direction::Outgoing).count();
        remaining[node.index()] = out;
        connected[node.index()] = out > 0 || g.edges_directed(node, Direction::Incoming).next().is_some();
    }

    let mut ready: BinaryHeap<Reverse<_>> = g
        .node_indices()
        .filter(|node| connected[node.index()] && remaining[node.index()] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for edge in g.edges_directed(node, Direction::Incoming) {
            let source = edge.source();
            remaining[source.index()] -= 1;
            if remaining[source.index()] == 0 {
                ready.push(Reverse(source));
            }
        }
    }

    let connected_count = connected.iter().filter(|c| **c).count();
    if order.len() != connected_count {
        let stuck: Vec<&str> = g
            .node_indices()
            .filter(|node| connected[node.index()] && remaining[node.index()] > 0)
            .map(|node| g[node].as_str())
            .collect();
        return Err(CoreError::InvariantViolation(format!(
            "dependency graph still contains a cycle through: {}",
            stuck.join(", ")
        )));
    }

    order.extend(g.node_indices().filter(|node| !connected[node.index()]));
    Ok(order.into_iter().map(|node| g[node].clone()).collect())
}

/// Position of every node in `order`, for checking precedence
pub fn positions(order: &[String]) -> std::collections::HashMap<&str, usize> {
    order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect()
}
