//! Catgraph Core — membership graph model, traversal, and request identity

pub mod model;
pub mod graph;
pub mod dot;
pub mod builder;
pub mod request;
pub mod metadata;
pub mod fixture;
pub mod lock;
pub mod error;


#[cfg(test)]
pub mod test_utils;

pub use model::{Namespace, NodeKey, Node, NodeStyle, Edge, EdgeStyle, GraphDefaults};
pub use graph::GraphModel;
pub use dot::to_dot;
pub use builder::{GraphBuilder, MembershipSource, TraversalDirection, TraversalOptions, TruncationPolicy};
pub use request::{Fingerprint, LayoutAlgorithm, LinkMode, OutputFormat, RenderParams, RenderRequest, RequestLimits};
pub use metadata::{CaseRule, CachingMetadataProvider, MetadataProvider, SiteMetadata, StaticMetadataProvider};
pub use fixture::{FixtureDocument, FixturePage, FixtureSource};
pub use lock::{KeyedLockGuard, KeyedLockRegistry};
pub use error::{DataSourceError, RequestError};
