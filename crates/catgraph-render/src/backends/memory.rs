//! In-process cache backend

use super::remove_artifact_files;
use crate::cache::{CacheBackend, CacheEntry};
use crate::error::CacheError;
use catgraph_core::Fingerprint;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::PathBuf;
use tracing::debug;

/// Entries live in a concurrent map; the oldest goes first once
/// `capacity` is exceeded. Artifact files leave with their entry.
pub struct MemoryBackend {
    entries: DashMap<Fingerprint, CacheEntry>,
    capacity: usize,
}

impl MemoryBackend {
    /// `capacity` of 0 means unbounded.
    pub fn new(capacity: usize) -> Self {
        MemoryBackend {
            entries: DashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_oldest(&self, keep: &Fingerprint) -> Result<(), CacheError> {
        let oldest = self
            .entries
            .iter()
            .filter(|e| e.key() != keep)
            .min_by_key(|e| e.value().created_at)
            .map(|e| e.key().clone());
        if let Some((key, entry)) = oldest.and_then(|key| self.entries.remove(&key)) {
            debug!("Evicting cache entry {}", key);
            remove_artifact_files(&entry, &[])?;
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<(), CacheError> {
        let current: Vec<PathBuf> = entry.artifact.files().cloned().collect();
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            remove_artifact_files(&previous, &current)?;
        }
        while self.capacity > 0 && self.entries.len() > self.capacity {
            self.evict_oldest(key)?;
        }
        Ok(())
    }

    fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheError> {
        let stale: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|e| e.value().created_at < cutoff)
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in stale {
            // A fresh entry may have replaced the stale one meanwhile.
            if let Some((_, entry)) = self.entries.remove_if(&key, |_, e| e.created_at < cutoff) {
                remove_artifact_files(&entry, &[])?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
