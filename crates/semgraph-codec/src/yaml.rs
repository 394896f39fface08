use std::fmt::Write;

use chrono::{DateTime, Utc};

use semgraph_core::types::Workflow;

use crate::timestamp;

/// Double-quoted scalar; only embedded quotes are escaped.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Scalar for a value that may span lines: literal block when multi-line.
fn scalar(value: &str, indent: usize) -> String {
    if !value.contains('\n') {
        return quote(value);
    }
    let pad = " ".repeat(indent);
    let mut block = String::from("|-");
    for line in value.lines() {
        block.push('\n');
        if !line.is_empty() {
            block.push_str(&pad);
            block.push_str(line);
        }
    }
    block
}

pub fn render(workflow: &Workflow, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();

    out.push_str("metadata:\n");
    let _ = writeln!(out, "  id: {}", quote(&workflow.id));
    let _ = writeln!(out, "  title: {}", quote(workflow.title()));
    let _ = writeln!(out, "  description: {}", scalar(&workflow.metadata.description, 4));
    let _ = writeln!(out, "  version: {}", quote(&workflow.version));
    let _ = writeln!(out, "  exportedAt: {}", quote(&timestamp(exported_at)));
    let _ = writeln!(out, "  nodeCount: {}", workflow.nodes.len());
    let _ = writeln!(out, "  edgeCount: {}", workflow.edges.len());

    if workflow.nodes.is_empty() {
        out.push_str("nodes: []\n");
    } else {
        out.push_str("nodes:\n");
        for node in &workflow.nodes {
            let _ = writeln!(out, "  - id: {}", quote(&node.id));
            let _ = writeln!(out, "    type: {}", quote(&node.node_type));
            let _ = writeln!(out, "    label: {}", quote(&node.data.label));
            let _ = writeln!(out, "    cluster: {}", quote(&node.data.metadata.cluster));
            let _ = writeln!(out, "    content: {}", scalar(&node.data.content, 6));
            if !node.data.tags.is_empty() {
                out.push_str("    tags:\n");
                for tag in &node.data.tags {
                    let _ = writeln!(out, "      - {}", quote(tag));
                }
            }
            out.push_str("    position:\n");
            let _ = writeln!(out, "      x: {}", node.position.x);
            let _ = writeln!(out, "      y: {}", node.position.y);
        }
    }

    if workflow.edges.is_empty() {
        out.push_str("edges: []\n");
    } else {
        out.push_str("edges:\n");
        for edge in &workflow.edges {
            let _ = writeln!(out, "  - id: {}", quote(&edge.id));
            let _ = writeln!(out, "    from: {}", quote(&edge.source));
            let _ = writeln!(out, "    to: {}", quote(&edge.target));
            let _ = writeln!(out, "    relation: {}", quote(edge.relation()));
            let _ = writeln!(out, "    condition: {}", quote(&edge.data.condition));
            let _ = writeln!(out, "    weight: {}", edge.data.weight);
        }
    }

    out
}
