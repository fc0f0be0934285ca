//! Deterministic DOT serialization of a GraphModel
//!
//! Nodes are emitted ordered by key and edges by `(from, to)`, so two
//! structurally identical graphs produce byte-identical source no matter
//! in which order they were built. Only non-empty attributes are written.

use crate::graph::GraphModel;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Name given to the emitted digraph.
pub const GRAPH_NAME: &str = "catgraph";

/// Serialize a graph to DOT source.
pub fn to_dot(graph: &GraphModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {} {{", quote(GRAPH_NAME));

    let defaults = graph.defaults();
    write_defaults(&mut out, "graph", &defaults.graph);
    write_defaults(&mut out, "node", &defaults.node);
    write_defaults(&mut out, "edge", &defaults.edge);

    for node in graph.sorted_nodes() {
        out.push_str("  ");
        out.push_str(&quote(&node.key.dot_id()));
        write_attrs(&mut out, node.attributes());
        out.push_str(";\n");
    }

    for edge in graph.sorted_edges() {
        let _ = write!(
            out,
            "  {} -> {}",
            quote(&edge.from.dot_id()),
            quote(&edge.to.dot_id())
        );
        write_attrs(&mut out, edge.attributes());
        out.push_str(";\n");
    }

    out.push_str("}\n");
    out
}

fn write_defaults(out: &mut String, kind: &str, attrs: &BTreeMap<String, String>) {
    let attrs: Vec<(&str, String)> = attrs
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| (name.as_str(), value.clone()))
        .collect();
    if attrs.is_empty() {
        return;
    }
    out.push_str("  ");
    out.push_str(kind);
    write_attrs(out, attrs);
    out.push_str(";\n");
}

fn write_attrs(out: &mut String, attrs: Vec<(&str, String)>) {
    if attrs.is_empty() {
        return;
    }
    out.push_str(" [");
    for (i, (name, value)) in attrs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}={}", name, quote(value));
    }
    out.push(']');
}

/// Quote a DOT identifier or attribute value.
fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => {}
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
