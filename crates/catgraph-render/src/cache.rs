//! Result cache for avoiding redundant renders

use crate::artifact::Artifact;
use crate::error::{CacheError, RenderError};
use crate::renderer::Renderer;
use catgraph_core::{Fingerprint, RenderRequest};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A stored artifact. Never mutated, only replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub artifact: Artifact,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(fingerprint: Fingerprint, artifact: Artifact, created_at: DateTime<Utc>) -> Self {
        CacheEntry {
            fingerprint,
            artifact,
            created_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Valid iff younger than `max_age`.
    pub fn is_valid(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) < max_age
    }
}

/// Storage behind the result cache.
///
/// Must tolerate concurrent `put` for different keys. Concurrent access to
/// one key does not happen: the coordinator serializes it.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `entry`, replacing whatever was stored under `key`.
    fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<(), CacheError>;

    /// Drop every entry created before `cutoff`. Returns how many went.
    fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheError>;

    /// Number of stored entries, valid or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub max_age_secs: i64,
}

/// Fingerprint → artifact, valid for a bounded age.
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    max_age: Duration,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, max_age: Duration) -> Self {
        ResultCache { backend, max_age }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Get a cached artifact if present and not expired.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<Artifact> {
        self.lookup_at(fingerprint, Utc::now())
    }

    pub fn lookup_at(&self, fingerprint: &Fingerprint, now: DateTime<Utc>) -> Option<Artifact> {
        match self.backend.get(fingerprint) {
            Ok(Some(entry)) if entry.is_valid(now, self.max_age) => Some(entry.artifact),
            Ok(Some(entry)) => {
                debug!(
                    "Cache entry {} is stale ({}s old)",
                    fingerprint,
                    entry.age(now).num_seconds()
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cache lookup for {} failed, treating as miss: {}", fingerprint, e);
                None
            }
        }
    }

    /// Store an artifact, replacing any previous entry.
    pub fn store(&self, fingerprint: &Fingerprint, artifact: Artifact) {
        self.store_at(fingerprint, artifact, Utc::now());
    }

    pub fn store_at(&self, fingerprint: &Fingerprint, artifact: Artifact, now: DateTime<Utc>) {
        let entry = CacheEntry::new(fingerprint.clone(), artifact, now);
        if let Err(e) = self.backend.put(fingerprint, entry) {
            warn!("Cache store for {} failed, continuing uncached: {}", fingerprint, e);
        }
    }

    /// Clear expired entries.
    pub fn purge(&self) -> Result<usize, CacheError> {
        let removed = self.backend.purge(Utc::now() - self.max_age)?;
        info!("Purged {} expired cache entries", removed);
        Ok(removed)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.backend.len(),
            max_age_secs: self.max_age.num_seconds(),
        }
    }
}

/// Renderer decorator: serve from the cache, render and store on a miss.
pub struct CachedRenderer {
    inner: Arc<dyn Renderer>,
    cache: Arc<ResultCache>,
}

impl CachedRenderer {
    pub fn new(inner: Arc<dyn Renderer>, cache: Arc<ResultCache>) -> Self {
        CachedRenderer { inner, cache }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }
}

#[async_trait::async_trait]
impl Renderer for CachedRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, RenderError> {
        let fingerprint = request.fingerprint();

        // Backends may block on disk and key locks.
        let cache = Arc::clone(&self.cache);
        let key = fingerprint.clone();
        let hit = tokio::task::spawn_blocking(move || {
            let artifact = cache.lookup(&key)?;
            if artifact.exists() {
                Some(artifact)
            } else {
                debug!("Cached artifact for {} vanished from disk", key);
                None
            }
        })
        .await
        .map_err(|e| RenderError::Internal(e.to_string()))?;
        if let Some(artifact) = hit {
            debug!("Cache hit for {}", fingerprint);
            return Ok(artifact);
        }

        let artifact = self.inner.render(request).await?;
        let cache = Arc::clone(&self.cache);
        let stored = artifact.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || cache.store(&fingerprint, stored)).await {
            warn!("Cache store task failed: {}", e);
        }
        Ok(artifact)
    }
}
