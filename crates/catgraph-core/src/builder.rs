//! Breadth-first traversal of the membership relation into a GraphModel

use crate::error::DataSourceError;
use crate::graph::GraphModel;
use crate::model::{Edge, EdgeStyle, GraphDefaults, Node, NodeKey, NodeStyle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// Answers "what belongs to X" and "what does X belong to".
///
/// Implementations own their retry policy; the builder never retries.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Pages and subcategories that are members of `node`.
    async fn members_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError>;

    /// Categories that `node` belongs to.
    async fn categories_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError>;
}

/// Which side of the membership relation the traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    /// From pages up to their parent categories.
    #[default]
    Ascending,
    /// From categories down to their members.
    Descending,
}

/// What happens to neighbors that do not fit under the node limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Drop them, and the edges that would point at them.
    #[default]
    Omit,
    /// Drop them, and restyle the node that lost them as truncated.
    Mark,
}

/// Static traversal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalOptions {
    pub direction: TraversalDirection,
    pub truncation: TruncationPolicy,
    pub defaults: GraphDefaults,
}

/// Builds membership graphs from a [`MembershipSource`].
pub struct GraphBuilder {
    source: Arc<dyn MembershipSource>,
    options: TraversalOptions,
}

impl GraphBuilder {
    pub fn new(source: Arc<dyn MembershipSource>, options: TraversalOptions) -> Self {
        GraphBuilder { source, options }
    }

    pub fn options(&self) -> &TraversalOptions {
        &self.options
    }

    async fn neighbors(&self, key: &NodeKey) -> Result<Vec<Node>, DataSourceError> {
        let mut neighbors = match self.options.direction {
            TraversalDirection::Ascending => self.source.categories_of(key).await?,
            TraversalDirection::Descending => self.source.members_of(key).await?,
        };
        // Fixed order makes truncation pick the same survivors every time.
        neighbors.sort_by(|a, b| a.key.cmp(&b.key));
        neighbors.dedup_by(|a, b| a.key == b.key);
        Ok(neighbors)
    }

    /// Walk outward from `roots` and collect what is reachable.
    ///
    /// Start nodes sit at depth 0; nodes at depth `d < depth_limit` are
    /// expanded. A `node_limit` of 0 means unbounded. Hidden nodes are kept
    /// as leaves unless `include_hidden` is set; start nodes are always
    /// expanded.
    pub async fn build<'a, I>(
        &self,
        roots: I,
        depth_limit: u32,
        node_limit: usize,
        include_hidden: bool,
    ) -> Result<GraphModel, DataSourceError>
    where
        I: IntoIterator<Item = &'a NodeKey>,
    {
        let mut graph = GraphModel::with_defaults(self.options.defaults.clone());
        let mut visited: HashSet<NodeKey> = HashSet::new();
        let mut queue: VecDeque<(NodeKey, u32)> = VecDeque::new();
        let admits = |graph: &GraphModel| node_limit == 0 || graph.node_count() < node_limit;

        for root in roots {
            if visited.contains(root) {
                continue;
            }
            if !admits(&graph) {
                graph.mark_truncated();
                break;
            }
            graph.add_node(Node::new(root.clone()).with_style(NodeStyle::Root));
            visited.insert(root.clone());
            queue.push_back((root.clone(), 0));
        }

        while let Some((key, depth)) = queue.pop_front() {
            if graph.is_truncated() {
                break;
            }
            if depth >= depth_limit {
                continue;
            }

            let neighbors = self.neighbors(&key).await?;
            debug!("{} has {} neighbors at depth {}", key, neighbors.len(), depth);

            let mut lost_neighbors = false;
            for neighbor in neighbors {
                if !graph.contains(&neighbor.key) {
                    if !admits(&graph) {
                        graph.mark_truncated();
                        lost_neighbors = true;
                        continue;
                    }
                    graph.add_node(neighbor.clone());
                }

                let style = if neighbor.hidden {
                    EdgeStyle::Hidden
                } else {
                    EdgeStyle::Plain
                };
                graph.add_edge(Edge::new(key.clone(), neighbor.key.clone()).with_style(style));

                let expandable = include_hidden || !neighbor.hidden;
                if visited.insert(neighbor.key.clone()) && expandable {
                    queue.push_back((neighbor.key, depth + 1));
                }
            }

            if lost_neighbors && self.options.truncation == TruncationPolicy::Mark {
                if let Some(node) = graph.node_mut(&key) {
                    node.style = NodeStyle::Truncated;
                }
            }
        }

        info!(
            "Built graph: {} nodes, {} edges{}",
            graph.node_count(),
            graph.edge_count(),
            if graph.is_truncated() { " (truncated)" } else { "" }
        );
        Ok(graph)
    }
}
