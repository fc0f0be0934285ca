//! CLI command implementations

use crate::config::AppConfig;
use anyhow::Context;
use catgraph_core::{
    CachingMetadataProvider, FixtureSource, GraphBuilder, MetadataProvider, RenderParams,
    RenderRequest, StaticMetadataProvider,
};
use catgraph_render::{
    create_backend, CachedRenderer, GraphvizCommand, OutputPipeline, RenderCoordinator, ResultCache,
};
use catgraph_server::{CatgraphServer, ServerConfig, ServerState};
use std::path::PathBuf;
use std::sync::Arc;

/// Long-lived core wired from configuration.
pub struct Services {
    pub coordinator: Arc<RenderCoordinator>,
    pub cache: Arc<ResultCache>,
    pub metadata: Arc<dyn MetadataProvider>,
}

/// Wire collaborators into the render stack.
pub fn build_services(config: &AppConfig) -> anyhow::Result<Services> {
    let site = config
        .default_site()
        .context("no site configured")?
        .clone();

    let provider = StaticMetadataProvider::new(config.sites.iter().cloned());
    let metadata: Arc<dyn MetadataProvider> =
        Arc::new(CachingMetadataProvider::new(Arc::new(provider), config.cache_max_age()));

    let fixture = config
        .source
        .fixture
        .as_deref()
        .context("no membership source configured (set source.fixture or CATGRAPH_FIXTURE)")?;
    let source = FixtureSource::load(fixture, &site)?;
    if source.site() != site.site {
        tracing::warn!(
            "Fixture describes {} but is served as {}",
            source.site(),
            site.site
        );
    }
    tracing::info!("Loaded {} pages from {}", source.page_count(), fixture.display());

    let builder = Arc::new(GraphBuilder::new(Arc::new(source), config.traversal.clone()));
    let layout = Arc::new(GraphvizCommand::new(config.render.dot_binary.clone()));
    let pipeline = OutputPipeline::new(
        builder,
        layout,
        Arc::clone(&metadata),
        config.render.work_dir.clone(),
    );

    let backend = create_backend(config.cache.backend, &config.cache.dir, config.cache.capacity)?;
    let cache = Arc::new(ResultCache::new(backend, config.cache_max_age()));
    let cached = CachedRenderer::new(Arc::new(pipeline), Arc::clone(&cache));
    let coordinator = Arc::new(RenderCoordinator::new(
        Arc::new(cached),
        config.render.max_concurrent,
    ));

    Ok(Services {
        coordinator,
        cache,
        metadata,
    })
}

pub async fn serve(config: AppConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let services = build_services(&config)?;
    let server_config = ServerConfig {
        host: host.unwrap_or_else(|| config.server.host.clone()),
        port: port.unwrap_or(config.server.port),
    };
    tracing::info!(
        "Starting Catgraph server on {}:{}",
        server_config.host,
        server_config.port
    );

    let default_site = config
        .default_site()
        .map(|s| s.site.clone())
        .unwrap_or_default();
    let state = ServerState::new(
        services.coordinator,
        services.metadata,
        default_site,
        config.render.work_dir.clone(),
    )
    .with_limits(config.limits.clone())
    .with_cache(services.cache)
    .with_timeout(config.request_timeout());

    CatgraphServer::new(state, server_config).start().await
}

pub async fn render(config: AppConfig, params: RenderParams, output: PathBuf) -> anyhow::Result<()> {
    let services = build_services(&config)?;
    let site_name = params
        .site
        .clone()
        .or_else(|| config.default_site().map(|s| s.site.clone()))
        .unwrap_or_default();
    let site = services.metadata.metadata_for(&site_name).await?;
    let request = RenderRequest::from_params(&params, &site, &config.limits)?;

    let artifact = services.coordinator.render(&request).await?;
    std::fs::copy(&artifact.path, &output)
        .with_context(|| format!("writing {}", output.display()))?;

    // An image-map wrapper needs its raster next to it.
    if let Some(dir) = output.parent() {
        for companion in artifact.companions.iter().filter(|c| {
            c.extension().and_then(|e| e.to_str()) == Some(request.format.extension())
        }) {
            if let Some(name) = companion.file_name() {
                std::fs::copy(companion, dir.join(name))?;
            }
        }
    }

    tracing::info!(
        "Wrote {} ({} nodes, {} edges{})",
        output.display(),
        artifact.node_count,
        artifact.edge_count,
        if artifact.truncated { ", truncated" } else { "" }
    );
    Ok(())
}

pub fn purge(config: AppConfig) -> anyhow::Result<()> {
    let backend = create_backend(config.cache.backend, &config.cache.dir, config.cache.capacity)?;
    let cache = ResultCache::new(backend, config.cache_max_age());
    let removed = cache.purge()?;
    tracing::info!("Cache purged, {} entries removed", removed);
    Ok(())
}
