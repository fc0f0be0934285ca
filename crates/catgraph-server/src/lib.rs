//! HTTP delivery layer
//!
//! Thin translation between query strings and the render stack: parse and
//! validate, hand off to the coordinator, stream the artifact back.

pub mod router;
pub mod handlers;

use catgraph_core::{MetadataProvider, RequestLimits};
use catgraph_render::{RenderCoordinator, ResultCache};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where to listen.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

/// Shared state behind every handler.
pub struct ServerState {
    pub renderer: Arc<RenderCoordinator>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub limits: RequestLimits,
    /// Site used when a request does not name one.
    pub default_site: String,
    /// Directory the pipeline writes artifacts into.
    pub work_dir: PathBuf,
    pub cache: Option<Arc<ResultCache>>,
    /// How long one request may wait for its render.
    pub request_timeout: Option<Duration>,
}

impl ServerState {
    pub fn new(
        renderer: Arc<RenderCoordinator>,
        metadata: Arc<dyn MetadataProvider>,
        default_site: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        ServerState {
            renderer,
            metadata,
            limits: RequestLimits::default(),
            default_site: default_site.into(),
            work_dir: work_dir.into(),
            cache: None,
            request_timeout: None,
        }
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// The HTTP server.
pub struct CatgraphServer {
    config: ServerConfig,
    state: Arc<ServerState>,
}

impl CatgraphServer {
    pub fn new(state: ServerState, config: ServerConfig) -> Self {
        CatgraphServer {
            config,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Listening on http://{}", listener.local_addr()?);

        let app = router::create_router(self.state);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
