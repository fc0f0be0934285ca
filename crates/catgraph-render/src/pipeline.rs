//! Output pipeline: build, serialize and (maybe) lay out one request

use crate::artifact::{Artifact, DeliveryPath};
use crate::error::RenderError;
use crate::imagemap;
use crate::layout::LayoutEngine;
use crate::renderer::Renderer;
use catgraph_core::{
    to_dot, Fingerprint, GraphBuilder, GraphModel, LinkMode, MetadataProvider, OutputFormat,
    RenderRequest, SiteMetadata,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const HTML_MIME: &str = "text/html; charset=utf-8";

static RENDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// File stem of one render: `<fingerprint>-<timestamp><seq>`.
///
/// Unique per render, so evicting an older entry of the same request never
/// deletes files of a newer one.
fn render_stem(fingerprint: &Fingerprint) -> String {
    let seq = RENDER_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!(
        "{}-{}{:03}",
        fingerprint,
        Utc::now().format("%Y%m%d%H%M%S%6f"),
        seq
    )
}

/// The renderer at the bottom of the stack.
///
/// Every file it produces lives directly under `work_dir`, named by
/// `render_stem`.
pub struct OutputPipeline {
    builder: Arc<GraphBuilder>,
    layout: Arc<dyn LayoutEngine>,
    metadata: Arc<dyn MetadataProvider>,
    work_dir: PathBuf,
}

impl OutputPipeline {
    pub fn new(
        builder: Arc<GraphBuilder>,
        layout: Arc<dyn LayoutEngine>,
        metadata: Arc<dyn MetadataProvider>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        OutputPipeline {
            builder,
            layout,
            metadata,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn file_for(&self, stem: &str, extension: &str) -> PathBuf {
        self.work_dir.join(format!("{}.{}", stem, extension))
    }

    async fn build_graph(
        &self,
        request: &RenderRequest,
        site: &SiteMetadata,
    ) -> Result<GraphModel, RenderError> {
        let mut graph = self
            .builder
            .build(
                &request.roots,
                request.depth,
                request.node_limit,
                request.include_hidden,
            )
            .await?;
        if request.link_mode == LinkMode::Target {
            graph.assign_links(|key| Some(site.page_url(key)));
        }
        Ok(graph)
    }

    fn title(request: &RenderRequest, site: &SiteMetadata) -> String {
        request
            .roots
            .iter()
            .map(|key| site.prefixed_title(key))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[async_trait::async_trait]
impl Renderer for OutputPipeline {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, RenderError> {
        let fingerprint = request.fingerprint();
        let stem = render_stem(&fingerprint);
        let delivery = DeliveryPath::select(request.format, request.link_mode);
        debug!("Rendering {} via {:?}", fingerprint, delivery);

        let site = self.metadata.metadata_for(&request.site).await?;
        let graph = self.build_graph(request, &site).await?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let source = self.file_for(&stem, OutputFormat::Dot.extension());
        tokio::fs::write(&source, to_dot(&graph)).await?;

        let mut artifact = Artifact {
            path: source.clone(),
            mime_type: OutputFormat::Dot.mime_type().to_string(),
            format: request.format,
            delivery,
            companions: Vec::new(),
            truncated: graph.is_truncated(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
        };

        match delivery {
            DeliveryPath::Raw => {}
            DeliveryPath::Direct => {
                let output = self.file_for(&stem, request.format.extension());
                self.layout
                    .render(&source, &output, request.algorithm, request.format, None)
                    .await?;
                artifact.path = output;
                artifact.mime_type = request.format.mime_type().to_string();
                artifact.companions.push(source);
            }
            DeliveryPath::ImageMap => {
                let raster = self.file_for(&stem, request.format.extension());
                let map = self.file_for(&stem, "map");
                self.layout
                    .render(&source, &raster, request.algorithm, request.format, Some(&map))
                    .await?;

                let markup = tokio::fs::read_to_string(&map).await?;
                let image_file = raster
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let wrapper = self.file_for(&stem, "html");
                let html = imagemap::wrap(&Self::title(request, &site), &image_file, &markup);
                tokio::fs::write(&wrapper, html).await?;

                artifact.path = wrapper;
                artifact.mime_type = HTML_MIME.to_string();
                artifact.companions = vec![raster, map, source];
            }
        }

        info!(
            "Rendered {} ({:?}, {} nodes, {} edges) with {}",
            fingerprint,
            delivery,
            artifact.node_count,
            artifact.edge_count,
            if delivery == DeliveryPath::Raw {
                "no layout"
            } else {
                self.layout.name()
            }
        );
        Ok(artifact)
    }
}
