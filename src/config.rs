//! Application configuration
//!
//! Loaded from an optional TOML file after `.env` has been applied to the
//! process environment; `CATGRAPH_*` variables then override single keys.

use anyhow::Context;
use catgraph_core::{RequestLimits, SiteMetadata, TraversalOptions};
use catgraph_render::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Seconds a request may wait for its render; 0 waits forever.
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            host: "127.0.0.1".to_string(),
            port: 7890,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    /// Distinct renders allowed at once; 0 is unbounded.
    pub max_concurrent: usize,
    pub work_dir: PathBuf,
    pub dot_binary: String,
}

impl Default for RenderSection {
    fn default() -> Self {
        RenderSection {
            max_concurrent: 4,
            work_dir: PathBuf::from(".catgraph/work"),
            dot_binary: "dot".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub backend: BackendKind,
    pub dir: PathBuf,
    pub max_age_secs: i64,
    /// Memory backend only; 0 is unbounded.
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            backend: BackendKind::Memory,
            dir: PathBuf::from(".catgraph/cache"),
            max_age_secs: 3600,
            capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// YAML membership fixture.
    pub fixture: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub render: RenderSection,
    pub limits: RequestLimits,
    pub traversal: TraversalOptions,
    pub cache: CacheSection,
    pub sites: Vec<SiteMetadata>,
    pub source: SourceSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerSection::default(),
            render: RenderSection::default(),
            limits: RequestLimits::default(),
            traversal: TraversalOptions::default(),
            cache: CacheSection::default(),
            sites: vec![SiteMetadata::new(
                "en.wikipedia.org",
                "https://en.wikipedia.org/wiki/",
            )],
            source: SourceSection::default(),
        }
    }
}

fn parse_var<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {}={:?}: {}", key, value, e))
}

impl AppConfig {
    /// Load `.env`, the optional config file, then environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_file.display());
        }

        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `CATGRAPH_*` overrides found through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CATGRAPH_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("CATGRAPH_PORT") {
            self.server.port = parse_var("CATGRAPH_PORT", &v)?;
        }
        if let Some(v) = lookup("CATGRAPH_REQUEST_TIMEOUT") {
            self.server.request_timeout_secs = parse_var("CATGRAPH_REQUEST_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("CATGRAPH_MAX_CONCURRENT") {
            self.render.max_concurrent = parse_var("CATGRAPH_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = lookup("CATGRAPH_WORK_DIR") {
            self.render.work_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CATGRAPH_DOT_BINARY") {
            self.render.dot_binary = v;
        }
        if let Some(v) = lookup("CATGRAPH_CACHE_BACKEND") {
            self.cache.backend = BackendKind::from_name(&v)
                .ok_or_else(|| anyhow::anyhow!("unknown cache backend {:?}", v))?;
        }
        if let Some(v) = lookup("CATGRAPH_CACHE_DIR") {
            self.cache.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CATGRAPH_CACHE_MAX_AGE") {
            self.cache.max_age_secs = parse_var("CATGRAPH_CACHE_MAX_AGE", &v)?;
        }
        if let Some(v) = lookup("CATGRAPH_FIXTURE") {
            self.source.fixture = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sites.is_empty() {
            anyhow::bail!("at least one site must be configured");
        }
        if self.cache.max_age_secs <= 0 {
            anyhow::bail!("cache.max_age_secs must be positive");
        }
        if self.limits.default_depth > self.limits.max_depth {
            anyhow::bail!("limits.default_depth exceeds limits.max_depth");
        }
        Ok(())
    }

    /// The first configured site answers requests that name none.
    pub fn default_site(&self) -> Option<&SiteMetadata> {
        self.sites.first()
    }

    pub fn site(&self, name: &str) -> Option<&SiteMetadata> {
        self.sites.iter().find(|s| s.site == name)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.server.request_timeout_secs > 0)
            .then(|| Duration::from_secs(self.server.request_timeout_secs))
    }

    pub fn cache_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.max_age_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catgraph_core::{TraversalDirection, TruncationPolicy};
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 7890);
        assert_eq!(config.default_site().unwrap().site, "en.wikipedia.org");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_sections() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 9000
            request_timeout_secs = 0

            [render]
            max_concurrent = 0

            [traversal]
            direction = "descending"
            truncation = "mark"

            [cache]
            backend = "fs"
            max_age_secs = 60

            [[sites]]
            site = "de.wikipedia.org"
            base_url = "https://de.wikipedia.org/wiki/"
            case = "case-sensitive"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.render.max_concurrent, 0);
        assert_eq!(config.traversal.direction, TraversalDirection::Descending);
        assert_eq!(config.traversal.truncation, TruncationPolicy::Mark);
        assert_eq!(config.cache.backend, BackendKind::Fs);
        assert_eq!(config.sites.len(), 1);
        assert!(config.site("de.wikipedia.org").is_some());
        assert_eq!(config.limits, RequestLimits::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CATGRAPH_PORT", "8123"),
            ("CATGRAPH_MAX_CONCURRENT", "16"),
            ("CATGRAPH_CACHE_BACKEND", "fs"),
            ("CATGRAPH_DOT_BINARY", "/opt/graphviz/bin/dot"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 8123);
        assert_eq!(config.render.max_concurrent, 16);
        assert_eq!(config.cache.backend, BackendKind::Fs);
        assert_eq!(config.render.dot_binary, "/opt/graphviz/bin/dot");
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == "CATGRAPH_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CATGRAPH_PORT"));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.sites.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.limits.default_depth = 20;
        assert!(config.validate().is_err());
    }
}
