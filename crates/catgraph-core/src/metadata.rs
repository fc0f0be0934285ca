//! Site metadata: title normalization and link targets

use crate::error::DataSourceError;
use crate::model::{Namespace, NodeKey};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// How the first letter of a title is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaseRule {
    /// First letter is always upper case.
    #[default]
    FirstLetter,
    CaseSensitive,
}

/// Metadata describing one content site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    /// Site identifier used in requests, e.g. `en.wikipedia.org`.
    pub site: String,
    /// Prefix that a page title is appended to for hyperlinks.
    pub base_url: String,
    /// Canonical namespace names by id. The main namespace has no name.
    #[serde(default = "default_namespaces")]
    pub namespaces: BTreeMap<i32, String>,
    #[serde(default)]
    pub case: CaseRule,
}

fn default_namespaces() -> BTreeMap<i32, String> {
    BTreeMap::from([
        (1, "Talk".to_string()),
        (2, "User".to_string()),
        (4, "Project".to_string()),
        (6, "File".to_string()),
        (10, "Template".to_string()),
        (14, "Category".to_string()),
    ])
}

fn separator_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_]+").expect("static regex is valid"))
}

impl SiteMetadata {
    pub fn new(site: impl Into<String>, base_url: impl Into<String>) -> Self {
        SiteMetadata {
            site: site.into(),
            base_url: base_url.into(),
            namespaces: default_namespaces(),
            case: CaseRule::FirstLetter,
        }
    }

    /// Look up a namespace by name, ignoring case.
    pub fn namespace_by_name(&self, name: &str) -> Option<Namespace> {
        let name = name.trim();
        self.namespaces
            .iter()
            .find(|(_, canonical)| canonical.eq_ignore_ascii_case(name))
            .map(|(&id, _)| Namespace(id))
    }

    /// Normalize a raw title into a node key.
    ///
    /// Underscores and whitespace runs collapse to a single space, a known
    /// namespace prefix is split off, and the case rule is applied.
    /// Returns `None` for titles that are empty after normalization.
    pub fn normalize(&self, raw: &str) -> Option<NodeKey> {
        let cleaned = separator_run().replace_all(raw, " ");
        let cleaned = cleaned.trim();

        let (namespace, title) = match cleaned.split_once(':') {
            Some((prefix, rest)) => match self.namespace_by_name(prefix) {
                Some(ns) => (ns, rest.trim()),
                None => (Namespace::MAIN, cleaned),
            },
            None => (Namespace::MAIN, cleaned),
        };
        if title.is_empty() {
            return None;
        }

        let title = match self.case {
            CaseRule::FirstLetter => capitalize_first(title),
            CaseRule::CaseSensitive => title.to_string(),
        };
        Some(NodeKey::new(namespace, title))
    }

    /// Full title including the namespace prefix.
    pub fn prefixed_title(&self, key: &NodeKey) -> String {
        match self.namespaces.get(&key.namespace.0) {
            Some(name) => format!("{}:{}", name, key.title),
            None => key.title.clone(),
        }
    }

    /// Hyperlink to the page behind `key`.
    pub fn page_url(&self, key: &NodeKey) -> String {
        let mut url = self.base_url.clone();
        for c in self.prefixed_title(key).chars() {
            match c {
                ' ' => url.push('_'),
                '?' => url.push_str("%3F"),
                '#' => url.push_str("%23"),
                '&' => url.push_str("%26"),
                '"' => url.push_str("%22"),
                '%' => url.push_str("%25"),
                _ => url.push(c),
            }
        }
        url
    }
}

fn capitalize_first(title: &str) -> String {
    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Supplies per-site metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn metadata_for(&self, site: &str) -> Result<Arc<SiteMetadata>, DataSourceError>;
}

/// Metadata from a fixed table, typically loaded from configuration.
pub struct StaticMetadataProvider {
    sites: BTreeMap<String, Arc<SiteMetadata>>,
}

impl StaticMetadataProvider {
    pub fn new(sites: impl IntoIterator<Item = SiteMetadata>) -> Self {
        StaticMetadataProvider {
            sites: sites
                .into_iter()
                .map(|meta| (meta.site.clone(), Arc::new(meta)))
                .collect(),
        }
    }

    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn metadata_for(&self, site: &str) -> Result<Arc<SiteMetadata>, DataSourceError> {
        self.sites
            .get(site)
            .cloned()
            .ok_or_else(|| DataSourceError::UnknownSite(site.to_string()))
    }
}

/// Memoizes another provider per site for a fixed time-to-live.
pub struct CachingMetadataProvider {
    inner: Arc<dyn MetadataProvider>,
    entries: DashMap<String, (DateTime<Utc>, Arc<SiteMetadata>)>,
    ttl: Duration,
}

impl CachingMetadataProvider {
    pub fn new(inner: Arc<dyn MetadataProvider>, ttl: Duration) -> Self {
        CachingMetadataProvider {
            inner,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Drop every memoized entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl MetadataProvider for CachingMetadataProvider {
    async fn metadata_for(&self, site: &str) -> Result<Arc<SiteMetadata>, DataSourceError> {
        let now = Utc::now();
        if let Some(entry) = self.entries.get(site) {
            let (fetched_at, meta) = entry.value();
            if now - *fetched_at < self.ttl {
                return Ok(Arc::clone(meta));
            }
        }

        let meta = self.inner.metadata_for(site).await?;
        self.entries
            .insert(site.to_string(), (now, Arc::clone(&meta)));
        tracing::debug!("Metadata for {} refreshed", site);
        Ok(meta)
    }
}
