//! Rendered artifacts and the delivery paths that produce them

use catgraph_core::{LinkMode, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a request is turned into its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryPath {
    /// Diagram source, no layout step.
    Raw,
    /// One layout invocation straight to the requested format.
    Direct,
    /// Raster plus client-side map, wrapped into an HTML page.
    ImageMap,
}

impl DeliveryPath {
    /// Raw always wins; a raster format with links goes through an
    /// image map; everything else renders directly.
    pub fn select(format: OutputFormat, links: LinkMode) -> Self {
        if !format.has_render_step() {
            DeliveryPath::Raw
        } else if !format.embeds_links() && links != LinkMode::None {
            DeliveryPath::ImageMap
        } else {
            DeliveryPath::Direct
        }
    }
}

/// A produced file plus what a client needs to serve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// The file handed to the client.
    pub path: PathBuf,
    pub mime_type: String,
    pub format: OutputFormat,
    pub delivery: DeliveryPath,
    /// Intermediate and referenced files (diagram source, raster behind
    /// a wrapper, coordinate map).
    pub companions: Vec<PathBuf>,
    pub truncated: bool,
    pub node_count: usize,
    pub edge_count: usize,
}

impl Artifact {
    /// The primary file followed by its companions.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.path).chain(self.companions.iter())
    }

    /// Whether every file of the artifact is still on disk.
    pub fn exists(&self) -> bool {
        self.files().all(|path| path.exists())
    }
}
