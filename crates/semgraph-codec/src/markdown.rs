use std::fmt::Write;

use chrono::{DateTime, Utc};

use semgraph_core::types::Workflow;

use crate::timestamp;

const UNCATEGORIZED: &str = "uncategorized";

fn cluster_of(cluster: &str) -> &str {
    if cluster.is_empty() {
        UNCATEGORIZED
    } else {
        cluster
    }
}

/// Longest run of backticks in `content`, so the fence can be made longer.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut current = 0;
    for c in content.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

pub fn render(workflow: &Workflow, exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let title = if workflow.title().is_empty() {
        "Untitled Workflow"
    } else {
        workflow.title()
    };

    let _ = writeln!(out, "# {}\n", title);
    if !workflow.metadata.description.is_empty() {
        let _ = writeln!(out, "{}\n", workflow.metadata.description);
    }

    out.push_str("## Overview\n\n");
    let _ = writeln!(out, "- **Nodes:** {}", workflow.nodes.len());
    let _ = writeln!(out, "- **Edges:** {}", workflow.edges.len());
    let _ = writeln!(out, "- **Version:** {}", workflow.version);
    let _ = writeln!(out, "- **Exported:** {}\n", timestamp(exported_at));

    // Tallies in order of first appearance.
    let mut tallies: Vec<(&str, usize)> = Vec::new();
    for node in &workflow.nodes {
        let cluster = cluster_of(&node.data.metadata.cluster);
        match tallies.iter_mut().find(|(c, _)| *c == cluster) {
            Some((_, n)) => *n += 1,
            None => tallies.push((cluster, 1)),
        }
    }
    if !tallies.is_empty() {
        out.push_str("## Clusters\n\n");
        for (cluster, count) in &tallies {
            let noun = if *count == 1 { "node" } else { "nodes" };
            let _ = writeln!(out, "- **{}**: {} {}", cluster, count, noun);
        }
        out.push('\n');
    }

    out.push_str("## Nodes\n\n");
    for (i, node) in workflow.nodes.iter().enumerate() {
        let _ = writeln!(out, "### {}. {}\n", i + 1, node.display_label());
        let _ = writeln!(out, "- **ID:** `{}`", node.id);
        let _ = writeln!(out, "- **Type:** {}", node.node_type);
        let _ = writeln!(
            out,
            "- **Cluster:** {}",
            cluster_of(&node.data.metadata.cluster)
        );
        if !node.data.tags.is_empty() {
            let _ = writeln!(out, "- **Tags:** {}", node.data.tags.join(", "));
        }
        out.push('\n');

        if !node.data.content.is_empty() {
            let fence = fence_for(&node.data.content);
            let _ = writeln!(out, "{}{}", fence, node.data.language);
            let _ = writeln!(out, "{}", node.data.content);
            let _ = writeln!(out, "{}\n", fence);
        }
        if !node.data.description.is_empty() {
            let _ = writeln!(out, "{}\n", node.data.description);
        }
    }

    if !workflow.edges.is_empty() {
        out.push_str("## Relationships\n\n");
        for (i, edge) in workflow.edges.iter().enumerate() {
            let label_of = |id: &str| {
                workflow
                    .node(id)
                    .map(|n| n.display_label().to_string())
                    .unwrap_or_else(|| id.to_string())
            };
            let _ = writeln!(
                out,
                "{}. **{}** → **{}** _({})_",
                i + 1,
                label_of(&edge.source),
                label_of(&edge.target),
                edge.relation()
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use semgraph_core::types::{Edge, EdgeData, Node, NodeData, NodeMetadata, NodeStyle, Position};

    fn node(id: &str, label: &str, cluster: &str, content: &str) -> Node {
        Node {
            id: id.into(),
            node_type: "concept".into(),
            position: Position::default(),
            data: NodeData {
                label: label.into(),
                content: content.into(),
                metadata: NodeMetadata {
                    cluster: cluster.into(),
                    ..Default::default()
                },
                ..Default::default()
            },
            style: NodeStyle::default(),
        }
    }

    #[test]
    fn test_markdown_structure() {
        let mut wf = Workflow::default();
        wf.metadata.title = "Plan".into();
        wf.nodes.push(node("a", "Alpha", "knowledge", "first"));
        wf.nodes.push(node("b", "Beta", "knowledge", "second"));
        wf.nodes.push(node("c", "Gamma", "", ""));
        let mut data = EdgeData::default();
        data.operator = "supports".into();
        wf.edges.push(Edge {
            id: "e".into(),
            source: "a".into(),
            target: "b".into(),
            source_handle: None,
            target_handle: None,
            data,
            style: serde_json::Value::Null,
        });

        let md = render(&wf, Utc::now());
        assert!(md.starts_with("# Plan\n"));
        assert!(md.contains("- **Nodes:** 3"));
        assert!(md.contains("- **knowledge**: 2 nodes"));
        assert!(md.contains("- **uncategorized**: 1 node"));
        assert!(md.contains("### 1. Alpha"));
        assert!(md.contains("```\nfirst\n```"));
        assert!(md.contains("1. **Alpha** → **Beta** _(supports)_"));
    }

    #[test]
    fn test_fence_grows_past_embedded_backticks() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("has ```code``` inside"), "````");
    }
}
