//! Graph wrapper using petgraph::StableDiGraph keyed by NodeKey

use crate::model::*;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// The membership graph — a directed graph with at most one edge per
/// ordered node pair.
///
/// Every edge endpoint is always present in the node set: `add_edge`
/// refuses edges whose endpoints are unknown.
pub struct GraphModel {
    inner: StableDiGraph<Node, Edge>,
    index: HashMap<NodeKey, NodeIndex>,
    defaults: GraphDefaults,
    truncated: bool,
}

impl std::fmt::Debug for GraphModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphModel")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("truncated", &self.truncated)
            .finish()
    }
}

impl GraphModel {
    pub fn new() -> Self {
        Self::with_defaults(GraphDefaults::default())
    }

    pub fn with_defaults(defaults: GraphDefaults) -> Self {
        GraphModel {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
            defaults,
            truncated: false,
        }
    }

    /// Add a node. Returns false if a node with the same key already exists,
    /// in which case the existing instance is kept.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.index.contains_key(&node.key) {
            return false;
        }
        let key = node.key.clone();
        let idx = self.inner.add_node(node);
        self.index.insert(key, idx);
        true
    }

    /// Add an edge. Returns false when the edge already exists or either
    /// endpoint is not in the node set.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        let (Some(&source), Some(&target)) = (self.index.get(&edge.from), self.index.get(&edge.to))
        else {
            tracing::debug!("Refusing edge {} -> {}: unknown endpoint", edge.from, edge.to);
            return false;
        };
        if self.inner.contains_edge(source, target) {
            return false;
        }
        self.inner.add_edge(source, target, edge);
        true
    }

    /// Get a node by key.
    pub fn node(&self, key: &NodeKey) -> Option<&Node> {
        self.index.get(key).and_then(|&idx| self.inner.node_weight(idx))
    }

    /// Get a mutable node by key.
    pub fn node_mut(&mut self, key: &NodeKey) -> Option<&mut Node> {
        let idx = *self.index.get(key)?;
        self.inner.node_weight_mut(idx)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    /// Check if an edge exists between two nodes.
    pub fn has_edge(&self, from: &NodeKey, to: &NodeKey) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&source), Some(&target)) => self.inner.contains_edge(source, target),
            _ => false,
        }
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    /// Iterate over all edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Get all outgoing edges from a node.
    pub fn edges_from(&self, key: &NodeKey) -> Vec<&Edge> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        self.inner
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|edge_ref| self.inner.edge_weight(edge_ref.id()))
            .collect()
    }

    /// Nodes ordered by key, independent of insertion order.
    pub fn sorted_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes().collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        nodes
    }

    /// Edges ordered by `(from, to)`, independent of insertion order.
    pub fn sorted_edges(&self) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges().collect();
        edges.sort_by(|a, b| (&a.from, &a.to).cmp(&(&b.from, &b.to)));
        edges
    }

    pub fn defaults(&self) -> &GraphDefaults {
        &self.defaults
    }

    /// Whether traversal stopped early because of the node limit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    /// Set the hyperlink of every node for which `link` yields a target.
    pub fn assign_links<F>(&mut self, mut link: F)
    where
        F: FnMut(&NodeKey) -> Option<String>,
    {
        for idx in self.inner.node_indices().collect::<Vec<_>>() {
            if let Some(node) = self.inner.node_weight_mut(idx) {
                node.href = link(&node.key);
            }
        }
    }
}

impl Default for GraphModel {
    fn default() -> Self {
        Self::new()
    }
}
