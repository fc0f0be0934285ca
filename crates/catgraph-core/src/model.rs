//! Core data structures for the membership graph

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric namespace of a page on the remote content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Namespace(pub i32);

impl Namespace {
    pub const MAIN: Namespace = Namespace(0);
    pub const CATEGORY: Namespace = Namespace(14);

    pub fn is_category(self) -> bool {
        self == Self::CATEGORY
    }
}

/// Identity of a node: namespace plus normalized title.
///
/// Ordering is namespace first, then title, which is also the order the
/// serializer emits nodes in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub namespace: Namespace,
    pub title: String,
}

impl NodeKey {
    pub fn new(namespace: Namespace, title: impl Into<String>) -> Self {
        NodeKey {
            namespace,
            title: title.into(),
        }
    }

    pub fn category(title: impl Into<String>) -> Self {
        Self::new(Namespace::CATEGORY, title)
    }

    pub fn page(title: impl Into<String>) -> Self {
        Self::new(Namespace::MAIN, title)
    }

    /// Stable identifier used for the node in diagram source.
    pub fn dot_id(&self) -> String {
        format!("{}:{}", self.namespace.0, self.title)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dot_id())
    }
}

/// Visual role of a node in the rendered diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeStyle {
    /// Ordinary page. Emits no style attributes.
    #[default]
    Plain,
    /// Member of the start set.
    Root,
    /// Category page.
    Category,
    /// Hidden (maintenance) category, shown but never expanded.
    Hidden,
    /// Node whose neighbors were cut off by the node limit.
    Truncated,
}

impl NodeStyle {
    pub fn attributes(self) -> &'static [(&'static str, &'static str)] {
        match self {
            NodeStyle::Plain => &[],
            NodeStyle::Root => &[("fillcolor", "#ffe9a8"), ("penwidth", "2"), ("style", "filled")],
            NodeStyle::Category => &[("fillcolor", "#dde8f6"), ("style", "filled")],
            NodeStyle::Hidden => &[("fontcolor", "#777777"), ("style", "dashed")],
            NodeStyle::Truncated => &[("fillcolor", "#f6dddd"), ("style", "filled,dashed")],
        }
    }
}

/// A single node in the membership graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: NodeKey,
    pub label: String,
    pub href: Option<String>,
    pub tooltip: Option<String>,
    pub style: NodeStyle,
    /// Hidden on the content source (e.g. maintenance categories).
    pub hidden: bool,
}

impl Node {
    /// A node labelled with its title, styled by namespace.
    pub fn new(key: NodeKey) -> Self {
        let style = if key.namespace.is_category() {
            NodeStyle::Category
        } else {
            NodeStyle::Plain
        };
        Node {
            label: key.title.clone(),
            key,
            href: None,
            tooltip: None,
            style,
            hidden: false,
        }
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        if hidden {
            self.style = NodeStyle::Hidden;
        }
        self
    }

    pub fn with_style(mut self, style: NodeStyle) -> Self {
        self.style = style;
        self
    }

    /// Non-empty attributes in emission order.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = Vec::new();
        if !self.label.is_empty() {
            attrs.push(("label", self.label.clone()));
        }
        if let Some(href) = self.href.as_ref().filter(|h| !h.is_empty()) {
            attrs.push(("URL", href.clone()));
        }
        if let Some(tooltip) = self.tooltip.as_ref().filter(|t| !t.is_empty()) {
            attrs.push(("tooltip", tooltip.clone()));
        }
        attrs.extend(
            self.style
                .attributes()
                .iter()
                .map(|(name, value)| (*name, value.to_string())),
        );
        attrs
    }
}

/// Visual role of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EdgeStyle {
    #[default]
    Plain,
    /// Edge toward a hidden node.
    Hidden,
}

impl EdgeStyle {
    pub fn attributes(self) -> &'static [(&'static str, &'static str)] {
        match self {
            EdgeStyle::Plain => &[],
            EdgeStyle::Hidden => &[("color", "#999999"), ("style", "dashed")],
        }
    }
}

/// A directed membership edge. Identity is the ordered `(from, to)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub style: EdgeStyle,
}

impl Edge {
    pub fn new(from: NodeKey, to: NodeKey) -> Self {
        Edge {
            from,
            to,
            style: EdgeStyle::Plain,
        }
    }

    pub fn with_style(mut self, style: EdgeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        self.style
            .attributes()
            .iter()
            .map(|(name, value)| (*name, value.to_string()))
            .collect()
    }
}

/// Graph-level default attributes, emitted before any node or edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDefaults {
    pub graph: BTreeMap<String, String>,
    pub node: BTreeMap<String, String>,
    pub edge: BTreeMap<String, String>,
}

impl GraphDefaults {
    /// No defaults at all.
    pub fn empty() -> Self {
        GraphDefaults {
            graph: BTreeMap::new(),
            node: BTreeMap::new(),
            edge: BTreeMap::new(),
        }
    }
}

impl Default for GraphDefaults {
    fn default() -> Self {
        let mut defaults = Self::empty();
        defaults.graph.insert("rankdir".into(), "BT".into());
        defaults.node.insert("fontname".into(), "Helvetica".into());
        defaults.node.insert("fontsize".into(), "10".into());
        defaults.node.insert("shape".into(), "box".into());
        defaults.edge.insert("arrowsize".into(), "0.7".into());
        defaults
    }
}
