//! Test doubles for the render stack

use crate::artifact::{Artifact, DeliveryPath};
use crate::error::{LayoutError, RenderError};
use crate::layout::LayoutEngine;
use crate::renderer::Renderer;
use async_trait::async_trait;
use catgraph_core::{
    FixtureSource, GraphBuilder, LayoutAlgorithm, MetadataProvider, OutputFormat, RenderRequest,
    SiteMetadata, StaticMetadataProvider, TraversalOptions,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SITE: &str = "test.example.org";

pub const FIXTURE: &str = r#"
site: test.example.org
pages:
  - title: Albert Einstein
    categories: ["Category:Physicists"]
  - title: "Category:Physicists"
    categories: ["Category:Physics"]
"#;

pub fn test_site() -> SiteMetadata {
    SiteMetadata::new(SITE, "https://test.example.org/wiki/")
}

pub fn metadata() -> Arc<dyn MetadataProvider> {
    Arc::new(StaticMetadataProvider::new([test_site()]))
}

pub fn fixture_builder() -> Arc<GraphBuilder> {
    let source = FixtureSource::from_yaml_str(FIXTURE, &test_site()).unwrap();
    Arc::new(GraphBuilder::new(Arc::new(source), TraversalOptions::default()))
}

pub fn request(title: &str) -> RenderRequest {
    let key = test_site().normalize(title).unwrap();
    RenderRequest::new(SITE, [key])
}

/// Inner renderer that counts executions, optionally sleeps, and can be
/// told to fail.
pub struct StubRenderer {
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    delay: Duration,
    failure: Option<RenderError>,
}

impl StubRenderer {
    pub fn new(delay: Duration) -> Self {
        StubRenderer {
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
            failure: None,
        }
    }

    pub fn failing(delay: Duration, error: RenderError) -> Self {
        StubRenderer {
            failure: Some(error),
            ..Self::new(delay)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn stub_artifact(request: &RenderRequest) -> Artifact {
    Artifact {
        path: PathBuf::from(format!("{}.dot", request.fingerprint())),
        mime_type: OutputFormat::Dot.mime_type().to_string(),
        format: request.format,
        delivery: DeliveryPath::Raw,
        companions: vec![],
        truncated: false,
        node_count: request.roots.len(),
        edge_count: 0,
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(stub_artifact(request)),
        }
    }
}

/// One recorded layout invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutCall {
    pub source: PathBuf,
    pub output: PathBuf,
    pub algorithm: LayoutAlgorithm,
    pub format: OutputFormat,
    pub image_map: Option<PathBuf>,
}

/// Layout engine that writes placeholder files instead of running Graphviz.
#[derive(Default)]
pub struct RecordingLayout {
    pub calls: Mutex<Vec<LayoutCall>>,
}

impl RecordingLayout {
    pub fn calls(&self) -> Vec<LayoutCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LayoutEngine for RecordingLayout {
    async fn render(
        &self,
        source: &Path,
        output: &Path,
        algorithm: LayoutAlgorithm,
        format: OutputFormat,
        image_map: Option<&Path>,
    ) -> Result<(), LayoutError> {
        self.calls.lock().unwrap().push(LayoutCall {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            algorithm,
            format,
            image_map: image_map.map(Path::to_path_buf),
        });
        std::fs::write(output, format!("rendered {}", format.engine_name())).unwrap();
        if let Some(map) = image_map {
            std::fs::write(map, r#"<map id="catgraph" name="catgraph"></map>"#).unwrap();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
