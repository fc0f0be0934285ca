//! Error types raised before and during traversal

use thiserror::Error;

/// Failure of a remote data collaborator (membership or metadata).
///
/// Never retried internally. Cloneable so a single failure can be handed
/// to every caller waiting on the same render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("failed to fetch {what}: {message}")]
    Fetch { what: String, message: String },
    #[error("malformed data from source: {0}")]
    Malformed(String),
    #[error("unknown site: {0}")]
    UnknownSite(String),
}

/// A request rejected before any work begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("no start titles given")]
    NoRoots,
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    #[error("invalid title: {0:?}")]
    InvalidTitle(String),
    #[error("unknown site: {0}")]
    UnknownSite(String),
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
    #[error("unknown layout algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("unknown link mode: {0}")]
    UnknownLinkMode(String),
    #[error("depth {requested} exceeds maximum {max}")]
    DepthTooLarge { requested: u32, max: u32 },
    #[error("node limit {requested} exceeds maximum {max}")]
    NodeLimitTooLarge { requested: usize, max: usize },
}
