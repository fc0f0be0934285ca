//! Catgraph Render — turning render requests into artifacts
//!
//! The stack, top to bottom: [`RenderCoordinator`] coalesces identical
//! concurrent requests and bounds fan-out, [`CachedRenderer`] serves
//! repeated requests from the [`ResultCache`], and [`OutputPipeline`]
//! builds the graph and drives the [`LayoutEngine`].

pub mod artifact;
pub mod renderer;
pub mod cache;
pub mod backends;
pub mod layout;
pub mod imagemap;
pub mod pipeline;
pub mod coordinator;
pub mod error;


#[cfg(test)]
pub mod test_utils;

pub use artifact::{Artifact, DeliveryPath};
pub use renderer::Renderer;
pub use cache::{CacheBackend, CacheEntry, CacheStats, CachedRenderer, ResultCache};
pub use backends::{create_backend, BackendKind, FsBackend, MemoryBackend};
pub use layout::{GraphvizCommand, LayoutEngine};
pub use pipeline::OutputPipeline;
pub use coordinator::RenderCoordinator;
pub use error::{CacheError, LayoutError, RenderError};
