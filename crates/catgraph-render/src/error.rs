//! Error taxonomy of the rendering pipeline

use catgraph_core::{DataSourceError, RequestError};
use thiserror::Error;

/// Failure of the external layout engine. Surfaced, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("failed to start layout engine {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("layout engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("layout engine produced no output at {0}")]
    MissingOutput(String),
}

/// Storage failure inside a cache backend.
///
/// Callers of the result cache never see this: it is logged and treated
/// as a miss.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(String),
    #[error("corrupt cache entry {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e.to_string())
    }
}

/// Outcome of a failed render, delivered verbatim to every coalesced caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("render cancelled before completion")]
    Cancelled,
    #[error("internal render failure: {0}")]
    Internal(String),
}

impl RenderError {
    /// Short, stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Request(_) => "request",
            RenderError::DataSource(_) => "data_source",
            RenderError::Layout(_) => "layout",
            RenderError::Cancelled => "cancelled",
            RenderError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Internal(e.to_string())
    }
}
