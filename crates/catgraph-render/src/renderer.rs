//! The renderer seam shared by the pipeline, the cache and the coordinator

use crate::artifact::Artifact;
use crate::error::RenderError;
use catgraph_core::RenderRequest;

/// Anything that turns a request into an artifact.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<Artifact, RenderError>;
}
