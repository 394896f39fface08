//! Advisory validation.
//!
//! Nothing here is enforced at write time: callers opt in (typically
//! before export or execution). Required fields are presence checks only.

use std::collections::HashSet;

use serde::Serialize;

use semgraph_core::types::{Edge, Node, Workflow};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

fn node_errors(node: &Node) -> Vec<String> {
    let mut errors = Vec::new();
    if node.id.trim().is_empty() {
        errors.push("id is required".to_string());
    }
    if node.node_type.trim().is_empty() {
        errors.push("type is required".to_string());
    }
    if node.data.label.trim().is_empty() {
        errors.push("data.label is required".to_string());
    }
    errors
}

fn edge_errors(edge: &Edge, node_ids: Option<&HashSet<&str>>) -> Vec<String> {
    let mut errors = Vec::new();
    if edge.id.trim().is_empty() {
        errors.push("id is required".to_string());
    }
    if edge.source.trim().is_empty() {
        errors.push("source is required".to_string());
    }
    if edge.target.trim().is_empty() {
        errors.push("target is required".to_string());
    }
    if !(0.0..=1.0).contains(&edge.data.weight) {
        errors.push(format!("weight {} is outside [0, 1]", edge.data.weight));
    }
    if let Some(ids) = node_ids {
        if !edge.source.is_empty() && !ids.contains(edge.source.as_str()) {
            errors.push(format!("source '{}' does not reference a node", edge.source));
        }
        if !edge.target.is_empty() && !ids.contains(edge.target.as_str()) {
            errors.push(format!("target '{}' does not reference a node", edge.target));
        }
    }
    errors
}

pub fn validate_node(node: &Node) -> ValidationReport {
    ValidationReport::from_errors(node_errors(node))
}

/// Validate an edge in isolation, or against `node_ids` when given.
pub fn validate_edge(edge: &Edge, node_ids: Option<&HashSet<&str>>) -> ValidationReport {
    ValidationReport::from_errors(edge_errors(edge, node_ids))
}

/// Validate the workflow and every node and edge in it.
///
/// Node and edge errors are prefixed with their index in the owning array.
pub fn validate_workflow(workflow: &Workflow) -> ValidationReport {
    let mut errors = Vec::new();

    if workflow.id.trim().is_empty() {
        errors.push("Workflow id is required".to_string());
    }

    let mut seen = HashSet::new();
    for (i, node) in workflow.nodes.iter().enumerate() {
        for err in node_errors(node) {
            errors.push(format!("Node {}: {}", i, err));
        }
        if !node.id.is_empty() && !seen.insert(node.id.as_str()) {
            errors.push(format!("Node {}: duplicate id '{}'", i, node.id));
        }
    }

    for (i, edge) in workflow.edges.iter().enumerate() {
        for err in edge_errors(edge, Some(&seen)) {
            errors.push(format!("Edge {}: {}", i, err));
        }
    }

    ValidationReport::from_errors(errors)
}
