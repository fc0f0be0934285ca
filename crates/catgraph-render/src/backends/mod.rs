//! Cache backend implementations

pub mod memory;
pub mod fs;

pub use fs::FsBackend;
pub use memory::MemoryBackend;

use crate::cache::{CacheBackend, CacheEntry};
use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Storage kind selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Fs,
}

impl BackendKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(BackendKind::Memory),
            "fs" | "file" | "filesystem" => Some(BackendKind::Fs),
            _ => None,
        }
    }
}

/// Factory function to create cache backends
///
/// `dir` is only used by the filesystem backend; `capacity` of 0 means
/// unbounded and only applies to the memory backend.
pub fn create_backend(
    kind: BackendKind,
    dir: &Path,
    capacity: usize,
) -> Result<Arc<dyn CacheBackend>, CacheError> {
    match kind {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new(capacity))),
        BackendKind::Fs => Ok(Arc::new(FsBackend::open(dir)?)),
    }
}

/// Delete the files behind a dropped entry, except those listed in `keep`.
/// Called whenever an entry leaves a backend.
pub(crate) fn remove_artifact_files(entry: &CacheEntry, keep: &[PathBuf]) -> Result<(), CacheError> {
    for file in entry.artifact.files().filter(|f| !keep.contains(f)) {
        remove_if_present(file)?;
    }
    debug!("Removed artifact files of {}", entry.fingerprint);
    Ok(())
}

pub(crate) fn remove_if_present(path: &Path) -> Result<(), CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
