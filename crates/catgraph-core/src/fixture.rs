//! Membership source backed by a YAML document
//!
//! ```yaml
//! site: en.wikipedia.org
//! pages:
//!   - title: "Category:Physics"
//!     categories: ["Category:Natural sciences"]
//!   - title: "Category:Physics stubs"
//!     hidden: true
//! ```

use crate::builder::MembershipSource;
use crate::error::DataSourceError;
use crate::metadata::SiteMetadata;
use crate::model::{Node, NodeKey};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDocument {
    pub site: String,
    #[serde(default)]
    pub pages: Vec<FixturePage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixturePage {
    pub title: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Default)]
struct PageRecord {
    hidden: bool,
    categories: BTreeSet<NodeKey>,
}

/// In-memory membership relation.
#[derive(Debug)]
pub struct FixtureSource {
    site: String,
    pages: HashMap<NodeKey, PageRecord>,
    members: HashMap<NodeKey, BTreeSet<NodeKey>>,
}

impl FixtureSource {
    pub fn from_document(doc: FixtureDocument, meta: &SiteMetadata) -> Result<Self, DataSourceError> {
        let normalize = |raw: &str| {
            meta.normalize(raw)
                .ok_or_else(|| DataSourceError::Malformed(format!("invalid title {:?}", raw)))
        };

        let mut pages: HashMap<NodeKey, PageRecord> = HashMap::new();
        let mut members: HashMap<NodeKey, BTreeSet<NodeKey>> = HashMap::new();

        for page in &doc.pages {
            let key = normalize(&page.title)?;
            let record = pages.entry(key.clone()).or_default();
            record.hidden |= page.hidden;
            for raw in &page.categories {
                let category = normalize(raw)?;
                record.categories.insert(category.clone());
                members.entry(category).or_default().insert(key.clone());
            }
        }

        tracing::debug!("Loaded fixture for {} with {} pages", doc.site, pages.len());
        Ok(FixtureSource {
            site: doc.site,
            pages,
            members,
        })
    }

    pub fn from_yaml_str(yaml: &str, meta: &SiteMetadata) -> Result<Self, DataSourceError> {
        let doc: FixtureDocument =
            serde_yaml::from_str(yaml).map_err(|e| DataSourceError::Malformed(e.to_string()))?;
        Self::from_document(doc, meta)
    }

    pub fn load(path: &Path, meta: &SiteMetadata) -> Result<Self, DataSourceError> {
        let yaml = std::fs::read_to_string(path).map_err(|e| DataSourceError::Fetch {
            what: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&yaml, meta)
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn node_for(&self, key: &NodeKey) -> Node {
        let hidden = self.pages.get(key).is_some_and(|p| p.hidden);
        Node::new(key.clone()).with_hidden(hidden)
    }
}

#[async_trait]
impl MembershipSource for FixtureSource {
    async fn members_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError> {
        Ok(self
            .members
            .get(node)
            .map(|keys| keys.iter().map(|k| self.node_for(k)).collect())
            .unwrap_or_default())
    }

    async fn categories_of(&self, node: &NodeKey) -> Result<Vec<Node>, DataSourceError> {
        Ok(self
            .pages
            .get(node)
            .map(|page| page.categories.iter().map(|k| self.node_for(k)).collect())
            .unwrap_or_default())
    }
}
