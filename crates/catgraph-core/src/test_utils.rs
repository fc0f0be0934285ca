//! Test utilities for Catgraph

use crate::builder::MembershipSource;
use crate::error::DataSourceError;
use crate::metadata::SiteMetadata;
use crate::model::{Node, NodeKey};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

/// Membership relation given as explicit `(member, category)` pairs.
///
/// Records every node it was asked to expand.
#[derive(Default)]
pub struct MapSource {
    categories: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
    members: BTreeMap<NodeKey, BTreeSet<NodeKey>>,
    hidden: HashSet<NodeKey>,
    pub expanded: Mutex<Vec<NodeKey>>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// `member` belongs to `category`.
    pub fn link(mut self, member: NodeKey, category: NodeKey) -> Self {
        self.categories
            .entry(member.clone())
            .or_default()
            .insert(category.clone());
        self.members.entry(category).or_default().insert(member);
        self
    }

    pub fn hide(mut self, key: NodeKey) -> Self {
        self.hidden.insert(key);
        self
    }

    fn node(&self, key: &NodeKey) -> Node {
        Node::new(key.clone()).with_hidden(self.hidden.contains(key))
    }

    pub fn expanded(&self) -> Vec<NodeKey> {
        self.expanded.lock().unwrap().clone()
    }
}

#[async_trait]
impl MembershipSource for MapSource {
    async fn members_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError> {
        self.expanded.lock().unwrap().push(node.clone());
        Ok(self
            .members
            .get(node)
            .map(|keys| keys.iter().map(|k| self.node(k)).collect())
            .unwrap_or_default())
    }

    async fn categories_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError> {
        self.expanded.lock().unwrap().push(node.clone());
        Ok(self
            .categories
            .get(node)
            .map(|keys| keys.iter().rev().map(|k| self.node(k)).collect())
            .unwrap_or_default())
    }
}

/// A source whose every lookup fails.
pub struct FailingSource;

#[async_trait]
impl MembershipSource for FailingSource {
    async fn members_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError> {
        Err(DataSourceError::Fetch {
            what: node.to_string(),
            message: "connection reset".into(),
        })
    }

    async fn categories_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError> {
        self.members_of(node).await
    }
}

pub fn test_site() -> SiteMetadata {
    SiteMetadata::new("test.example.org", "https://test.example.org/wiki/")
}

pub fn cat(title: &str) -> NodeKey {
    NodeKey::category(title)
}

pub fn page(title: &str) -> NodeKey {
    NodeKey::page(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_map_source_is_symmetric() {
        let source = MapSource::new().link(page("Einstein"), cat("Physicists"));
        let up = source.categories_of(&page("Einstein")).await.unwrap();
        let down = source.members_of(&cat("Physicists")).await.unwrap();
        assert_eq!(up[0].key, cat("Physicists"));
        assert_eq!(down[0].key, page("Einstein"));
        assert_eq!(source.expanded().len(), 2);
    }
}
