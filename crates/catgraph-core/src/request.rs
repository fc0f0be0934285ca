//! Canonical render requests and their fingerprints

use crate::error::RequestError;
use crate::metadata::SiteMetadata;
use crate::model::NodeKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::{self, Write};

/// Whether rendered nodes carry hyperlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    #[default]
    None,
    /// Link every node to its page on the content site.
    Target,
}

impl LinkMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" | "" => Some(LinkMode::None),
            "target" | "wiki" => Some(LinkMode::Target),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LinkMode::None => "none",
            LinkMode::Target => "target",
        }
    }
}

/// Requested artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Diagram source only; no layout step.
    Dot,
    #[default]
    Svg,
    Pdf,
    Png,
    Gif,
    Jpeg,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dot" | "gv" => Some(OutputFormat::Dot),
            "svg" => Some(OutputFormat::Svg),
            "pdf" => Some(OutputFormat::Pdf),
            "png" => Some(OutputFormat::Png),
            "gif" => Some(OutputFormat::Gif),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            _ => None,
        }
    }

    /// False for formats delivered as diagram source.
    pub fn has_render_step(self) -> bool {
        self != OutputFormat::Dot
    }

    /// True for formats that carry hyperlinks themselves.
    pub fn embeds_links(self) -> bool {
        matches!(self, OutputFormat::Svg | OutputFormat::Pdf)
    }

    /// Name of the format as understood by the layout engine.
    pub fn engine_name(self) -> &'static str {
        match self {
            OutputFormat::Dot => "dot",
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn extension(self) -> &'static str {
        self.engine_name()
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Dot => "text/vnd.graphviz",
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Layout algorithm used by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithm {
    #[default]
    Dot,
    Neato,
    Fdp,
    Sfdp,
    Twopi,
    Circo,
}

impl LayoutAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dot" => Some(LayoutAlgorithm::Dot),
            "neato" => Some(LayoutAlgorithm::Neato),
            "fdp" => Some(LayoutAlgorithm::Fdp),
            "sfdp" => Some(LayoutAlgorithm::Sfdp),
            "twopi" => Some(LayoutAlgorithm::Twopi),
            "circo" => Some(LayoutAlgorithm::Circo),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LayoutAlgorithm::Dot => "dot",
            LayoutAlgorithm::Neato => "neato",
            LayoutAlgorithm::Fdp => "fdp",
            LayoutAlgorithm::Sfdp => "sfdp",
            LayoutAlgorithm::Twopi => "twopi",
            LayoutAlgorithm::Circo => "circo",
        }
    }
}

/// Deterministic key of a request, shared by caching and coalescing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable, canonical render request.
///
/// The start set is ordered, so requests naming the same titles in a
/// different order are equal and share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderRequest {
    pub site: String,
    pub roots: BTreeSet<NodeKey>,
    pub depth: u32,
    /// Maximum number of nodes; 0 means unbounded.
    pub node_limit: usize,
    pub include_hidden: bool,
    pub link_mode: LinkMode,
    pub format: OutputFormat,
    pub algorithm: LayoutAlgorithm,
}

impl RenderRequest {
    /// A request with default options for the given start set.
    pub fn new(site: impl Into<String>, roots: impl IntoIterator<Item = NodeKey>) -> Self {
        RenderRequest {
            site: site.into(),
            roots: roots.into_iter().collect(),
            depth: RequestLimits::default().default_depth,
            node_limit: RequestLimits::default().default_node_limit,
            include_hidden: false,
            link_mode: LinkMode::None,
            format: OutputFormat::default(),
            algorithm: LayoutAlgorithm::default(),
        }
    }

    /// Build a request from raw parameters, normalizing titles and
    /// enforcing limits.
    pub fn from_params(
        params: &RenderParams,
        site: &SiteMetadata,
        limits: &RequestLimits,
    ) -> Result<Self, RequestError> {
        if let Some(requested) = params.site.as_deref() {
            if requested != site.site {
                return Err(RequestError::UnknownSite(requested.to_string()));
            }
        }

        let mut roots = BTreeSet::new();
        for raw in params.root.iter().filter(|r| !r.trim().is_empty()) {
            let key = site
                .normalize(raw)
                .ok_or_else(|| RequestError::InvalidTitle(raw.clone()))?;
            roots.insert(key);
        }
        if roots.is_empty() {
            return Err(RequestError::NoRoots);
        }

        let depth = params.depth.unwrap_or(limits.default_depth);
        if depth > limits.max_depth {
            return Err(RequestError::DepthTooLarge {
                requested: depth,
                max: limits.max_depth,
            });
        }

        let node_limit = params.limit.unwrap_or(limits.default_node_limit);
        if limits.max_node_limit > 0 && (node_limit == 0 || node_limit > limits.max_node_limit) {
            return Err(RequestError::NodeLimitTooLarge {
                requested: node_limit,
                max: limits.max_node_limit,
            });
        }

        let format = match params.format.as_deref() {
            Some(name) => OutputFormat::from_name(name)
                .ok_or_else(|| RequestError::UnknownFormat(name.to_string()))?,
            None => OutputFormat::default(),
        };
        let algorithm = match params.algorithm.as_deref() {
            Some(name) => LayoutAlgorithm::from_name(name)
                .ok_or_else(|| RequestError::UnknownAlgorithm(name.to_string()))?,
            None => LayoutAlgorithm::default(),
        };
        let link_mode = match params.links.as_deref() {
            Some(name) => LinkMode::from_name(name)
                .ok_or_else(|| RequestError::UnknownLinkMode(name.to_string()))?,
            None => LinkMode::default(),
        };

        Ok(RenderRequest {
            site: site.site.clone(),
            roots,
            depth,
            node_limit,
            include_hidden: params.hidden.unwrap_or(false),
            link_mode,
            format,
            algorithm,
        })
    }

    /// Canonical text form: one `field=value` line per field, roots in
    /// key order.
    fn canonical(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "site={}", self.site);
        for root in &self.roots {
            let _ = writeln!(text, "root={}", root.dot_id());
        }
        let _ = writeln!(text, "depth={}", self.depth);
        let _ = writeln!(text, "limit={}", self.node_limit);
        let _ = writeln!(text, "hidden={}", self.include_hidden);
        let _ = writeln!(text, "links={}", self.link_mode.name());
        let _ = writeln!(text, "format={}", self.format.engine_name());
        let _ = writeln!(text, "algorithm={}", self.algorithm.name());
        text
    }

    /// SHA-256 of the canonical form, lowercase hex.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        Fingerprint(format!("{:x}", hasher.finalize()))
    }
}

/// Raw, unvalidated request parameters as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderParams {
    pub site: Option<String>,
    #[serde(default)]
    pub root: Vec<String>,
    pub depth: Option<u32>,
    pub limit: Option<usize>,
    pub hidden: Option<bool>,
    pub links: Option<String>,
    pub format: Option<String>,
    pub algorithm: Option<String>,
}

/// Bounds applied to incoming requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    pub default_depth: u32,
    pub max_depth: u32,
    pub default_node_limit: usize,
    /// 0 disables the upper bound.
    pub max_node_limit: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        RequestLimits {
            default_depth: 3,
            max_depth: 8,
            default_node_limit: 500,
            max_node_limit: 2000,
        }
    }
}
