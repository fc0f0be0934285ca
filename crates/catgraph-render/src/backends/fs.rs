//! Filesystem cache backend
//!
//! One `<fingerprint>.entry` file per key, bincode-encoded. Writes go to a
//! temporary file first and are renamed into place, so a reader never sees
//! a half-written entry.

use super::{remove_artifact_files, remove_if_present};
use crate::cache::{CacheBackend, CacheEntry};
use crate::error::CacheError;
use catgraph_core::{Fingerprint, KeyedLockRegistry};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ENTRY_EXT: &str = "entry";

pub struct FsBackend {
    dir: PathBuf,
    locks: KeyedLockRegistry<String>,
}

impl FsBackend {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("Opened filesystem cache at {}", dir.display());
        Ok(FsBackend {
            dir,
            locks: KeyedLockRegistry::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXT))
    }

    fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let bytes = match fs::read(self.entry_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    /// Remove the entry file and the artifact files it points at.
    fn evict(&self, key: &str, entry: Option<&CacheEntry>) -> Result<(), CacheError> {
        let _guard = self.locks.acquire(key.to_string());
        if let Some(entry) = entry {
            remove_artifact_files(entry, &[])?;
        }
        remove_if_present(&self.entry_path(key))
    }

    fn stored_keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}

impl CacheBackend for FsBackend {
    fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let _guard = self.locks.acquire(key.as_str().to_string());
        self.read_entry(key.as_str())
    }

    fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<(), CacheError> {
        let _guard = self.locks.acquire(key.as_str().to_string());
        let bytes = bincode::serialize(&entry).map_err(|e| CacheError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        // An unreadable predecessor is simply overwritten.
        let previous = self.read_entry(key.as_str()).ok().flatten();

        let path = self.entry_path(key.as_str());
        let tmp = path.with_extension(format!("{}.tmp", ENTRY_EXT));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!("Stored cache entry {}", path.display());

        if let Some(previous) = previous {
            let current: Vec<PathBuf> = entry.artifact.files().cloned().collect();
            remove_artifact_files(&previous, &current)?;
        }
        Ok(())
    }

    fn purge(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut removed = 0;
        for key in self.stored_keys()? {
            let _guard = self.locks.acquire(key.clone());
            match self.read_entry(&key) {
                Ok(Some(entry)) if entry.created_at < cutoff => {
                    self.evict(&key, Some(&entry))?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Dropping unreadable cache entry {}: {}", key, e);
                    self.evict(&key, None)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.stored_keys().map(|keys| keys.len()).unwrap_or(0)
    }
}
