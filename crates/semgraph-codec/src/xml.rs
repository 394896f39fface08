use std::fmt::Write;

use chrono::{DateTime, Utc};

use semgraph_core::types::Workflow;

use crate::timestamp;

pub const NAMESPACE: &str = "urn:semgraph:workflow:1.0";

/// Escape the five predefined XML entities.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(workflow: &Workflow, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<workflow xmlns=\"{}\" id=\"{}\" version=\"{}\">",
        NAMESPACE,
        escape(&workflow.id),
        escape(&workflow.version)
    );

    out.push_str("  <metadata>\n");
    let _ = writeln!(out, "    <title>{}</title>", escape(workflow.title()));
    let _ = writeln!(
        out,
        "    <description>{}</description>",
        escape(&workflow.metadata.description)
    );
    let _ = writeln!(out, "    <exportedAt>{}</exportedAt>", timestamp(exported_at));
    out.push_str("  </metadata>\n");

    let _ = writeln!(out, "  <nodes count=\"{}\">", workflow.nodes.len());
    for node in &workflow.nodes {
        let _ = writeln!(
            out,
            "    <node id=\"{}\" type=\"{}\" cluster=\"{}\">",
            escape(&node.id),
            escape(&node.node_type),
            escape(&node.data.metadata.cluster)
        );
        let _ = writeln!(out, "      <label>{}</label>", escape(&node.data.label));
        let _ = writeln!(out, "      <content>{}</content>", escape(&node.data.content));
        let _ = writeln!(
            out,
            "      <position x=\"{}\" y=\"{}\"/>",
            node.position.x, node.position.y
        );
        if node.data.tags.is_empty() {
            out.push_str("      <tags/>\n");
        } else {
            out.push_str("      <tags>\n");
            for tag in &node.data.tags {
                let _ = writeln!(out, "        <tag>{}</tag>", escape(tag));
            }
            out.push_str("      </tags>\n");
        }
        out.push_str("    </node>\n");
    }
    out.push_str("  </nodes>\n");

    let _ = writeln!(out, "  <edges count=\"{}\">", workflow.edges.len());
    for edge in &workflow.edges {
        let _ = writeln!(
            out,
            "    <edge id=\"{}\" source=\"{}\" target=\"{}\">",
            escape(&edge.id),
            escape(&edge.source),
            escape(&edge.target)
        );
        let _ = writeln!(out, "      <relation>{}</relation>", escape(edge.relation()));
        let _ = writeln!(out, "      <condition>{}</condition>", escape(&edge.data.condition));
        out.push_str("    </edge>\n");
    }
    out.push_str("  </edges>\n");
    out.push_str("</workflow>\n");

    out
}
