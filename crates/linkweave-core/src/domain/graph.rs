//! Directed, weighted multigraph over opaque string node ids.
//!
//! Backed by a petgraph [`StableDiGraph`]. Nodes are never removed, so a
//! node's index is its insertion position, and every edge gets a sequence
//! number; algorithms built on top break ties with those. Each edge carries an
//! `owner`: removing an owner removes every edge it contributed, which is how
//! one rich-text value with several links is stashed as a unit.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// An edge `source -> target` meaning "source needs target to exist first"
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge<O> {
    /// Node that holds the reference
    pub source: String,
    /// Node being referenced
    pub target: String,
    /// Removal cost
    pub weight: f64,
    /// What contributed the edge
    pub owner: O,
    /// Insertion sequence number, unique within the graph
    pub seq: usize,
}

/// Dependency graph
#[derive(Debug, Clone)]
pub struct DependencyGraph<O> {
    graph: StableDiGraph<String, GraphEdge<O>>,
    index: HashMap<String, NodeIndex>,
    edges: BTreeMap<usize, EdgeIndex>,
    owners: HashMap<O, Vec<usize>>,
    next_seq: usize,
}

impl<O> Default for DependencyGraph<O> {
    fn default() -> Self {
        Self {
            graph: StableDiGraph::default(),
            index: HashMap::new(),
            edges: BTreeMap::new(),
            owners: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<O: Clone + Eq + Hash> DependencyGraph<O> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; returns false if it was already present
    pub fn add_node(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            return false;
        }
        let node = self.graph.add_node(id.clone());
        self.index.insert(id, node);
        true
    }

    /// Add a weighted edge and return its sequence number.
    ///
    /// Both endpoints must already be nodes of the graph.
    pub fn add_edge(&mut self, source: &str, target: &str, weight: f64, owner: O) -> usize {
        debug_assert!(self.contains_node(source), "unknown source node {source}");
        debug_assert!(self.contains_node(target), "unknown target node {target}");
        self.add_node(source);
        self.add_node(target);

        let seq = self.next_seq;
        self.next_seq += 1;
        let (s, t) = (self.index[source], self.index[target]);
        let edge = self.graph.add_edge(
            s,
            t,
            GraphEdge {
                source: source.to_string(),
                target: target.to_string(),
                weight,
                owner: owner.clone(),
                seq,
            },
        );
        self.edges.insert(seq, edge);
        self.owners.entry(owner).or_default().push(seq);
        seq
    }

    /// Whether the node exists
    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Node ids in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(move |n| self.graph[n].as_str())
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge<O>> {
        self.edges.values().map(move |&e| &self.graph[e])
    }

    /// Edges leaving a node, in insertion order
    pub fn outgoing(&self, id: &str) -> Vec<&GraphEdge<O>> {
        self.directed(id, Direction::Outgoing)
    }

    /// Edges entering a node, in insertion order
    pub fn incoming(&self, id: &str) -> Vec<&GraphEdge<O>> {
        self.directed(id, Direction::Incoming)
    }

    /// Remove a single edge by its sequence number
    pub fn remove_edge(&mut self, seq: usize) -> Option<GraphEdge<O>> {
        let index = self.edges.remove(&seq)?;
        let edge = self.graph.remove_edge(index)?;
        if let Some(seqs) = self.owners.get_mut(&edge.owner) {
            seqs.retain(|s| *s != seq);
            if seqs.is_empty() {
                self.owners.remove(&edge.owner);
            }
        }
        Some(edge)
    }

    /// Copy of the graph without edge `seq`; `self` is untouched
    pub fn without_edge(&self, seq: usize) -> Self {
        let mut copy = self.clone();
        copy.remove_edge(seq);
        copy
    }

    /// Remove every edge contributed by `owner` and return them
    pub fn remove_owner(&mut self, owner: &O) -> Vec<GraphEdge<O>> {
        let seqs = self.owners.remove(owner).unwrap_or_default();
        seqs.into_iter().filter_map(|seq| self.remove_edge(seq)).collect()
    }

    /// Copy of the graph without the edges of `owner`; `self` is untouched
    pub fn without_owner(&self, owner: &O) -> Self {
        let mut copy = self.clone();
        copy.remove_owner(owner);
        copy
    }

    /// True if no directed cycle (self-loops included) exists
    pub fn is_acyclic(&self) -> bool {
        self.cyclic_components(None).is_empty()
    }

    /// Strongly connected components that contain a cycle.
    ///
    /// A component qualifies if it has more than one node or a self-loop.
    /// With `restrict_to`, only nodes in that set and edges between them are
    /// considered. Members are listed in node insertion order and components
    /// are ordered by their first member.
    pub fn strongly_connected_components(&self, restrict_to: Option<&HashSet<String>>) -> Vec<Vec<String>> {
        let members: Option<Vec<NodeIndex>> = restrict_to.map(|set| {
            let mut members: Vec<NodeIndex> = set.iter().filter_map(|id| self.index.get(id).copied()).collect();
            members.sort_unstable();
            members
        });

        self.cyclic_components(members.as_deref())
            .into_iter()
            .map(|c| c.into_iter().map(|n| self.graph[n].clone()).collect())
            .collect()
    }

    /// Cyclic components over the whole graph, or over the subgraph induced
    /// by `members` (sorted ascending). The restricted form only walks the
    /// edges leaving `members`.
    pub(crate) fn cyclic_components(&self, members: Option<&[NodeIndex]>) -> Vec<Vec<NodeIndex>> {
        let components = match members {
            None => tarjan_scc(&self.graph),
            Some(members) => self.components_within(members),
        };

        let mut cyclic: Vec<Vec<NodeIndex>> = components
            .into_iter()
            .filter(|c| c.len() > 1 || self.graph.find_edge(c[0], c[0]).is_some())
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .collect();
        cyclic.sort_by_key(|c| c[0]);
        cyclic
    }

    /// Lowest-weight edge with both ends in `members` (sorted ascending);
    /// ties go to the earliest inserted edge
    pub(crate) fn cheapest_edge_within(&self, members: &[NodeIndex]) -> Option<&GraphEdge<O>> {
        members
            .iter()
            .flat_map(|&n| self.graph.edges_directed(n, Direction::Outgoing))
            .filter(|e| members.binary_search(&e.target()).is_ok())
            .map(|e| &self.graph[e.id()])
            .min_by(|a, b| a.weight.total_cmp(&b.weight).then(a.seq.cmp(&b.seq)))
    }

    pub(crate) fn as_petgraph(&self) -> &StableDiGraph<String, GraphEdge<O>> {
        &self.graph
    }

    fn directed(&self, id: &str, direction: Direction) -> Vec<&GraphEdge<O>> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<&GraphEdge<O>> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| &self.graph[e.id()])
            .collect();
        edges.sort_by_key(|e| e.seq);
        edges
    }

    // Tarjan on a scratch graph holding only `members`, so the cost follows
    // the component size rather than the whole batch.
    fn components_within(&self, members: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
        let mut sub: DiGraph<NodeIndex, ()> = DiGraph::with_capacity(members.len(), 0);
        let local: HashMap<NodeIndex, _> = members.iter().map(|&n| (n, sub.add_node(n))).collect();

        for &n in members {
            for edge in self.graph.edges_directed(n, Direction::Outgoing) {
                if let Some(&target) = local.get(&edge.target()) {
                    sub.add_edge(local[&n], target, ());
                }
            }
        }

        tarjan_scc(&sub)
            .into_iter()
            .map(|c| c.into_iter().map(|i| sub[i]).collect())
            .collect()
    }
}
