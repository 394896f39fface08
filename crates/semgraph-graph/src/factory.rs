use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

use semgraph_core::ontology::{OntologyCatalog, BLANK_TYPE};
use semgraph_core::types::*;

const ID_SUFFIX_LEN: usize = 9;

/// Generate an id: millisecond timestamp followed by a short random suffix.
///
/// Two ids created in the same millisecond differ only by the suffix, so
/// collisions are possible (if unlikely) under tight synchronous loops.
pub fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{}{}", Utc::now().timestamp_millis(), suffix)
}

/// Seeded field list for non-blank nodes, in display order.
fn seeded_fields(info: &semgraph_core::NodeTypeInfo, content: &str) -> Vec<NodeField> {
    vec![
        NodeField::new("title", FieldKind::Text, json!(info.name)),
        NodeField::new("tags", FieldKind::Tags, json!([])),
        NodeField::new("ontology-type", FieldKind::Text, json!(info.code)),
        NodeField::new("description", FieldKind::LongText, json!(info.description)),
        NodeField::new("content", FieldKind::LongText, json!(content)),
        NodeField::new("icon", FieldKind::Text, json!(info.icon)),
    ]
}

/// Create a fully populated node of `node_type` at `position`.
///
/// Unknown types are accepted; their metadata comes from the catalog's
/// freeform descriptor while `node_type` is kept as given.
pub fn create_node(
    catalog: &dyn OntologyCatalog,
    node_type: &str,
    position: Position,
    content: &str,
) -> Node {
    let info = catalog.describe(node_type);
    let now = Utc::now();

    let fields = if node_type == BLANK_TYPE {
        Vec::new()
    } else {
        seeded_fields(&info, content)
    };

    Node {
        id: format!("node-{}", generate_id()),
        node_type: node_type.to_string(),
        position,
        data: NodeData {
            label: info.name.clone(),
            title: info.name.clone(),
            tags: Vec::new(),
            description: info.description.clone(),
            content: content.to_string(),
            language: String::new(),
            fields,
            metadata: NodeMetadata {
                cluster: info.cluster.clone(),
                created_at: Some(now),
                updated_at: Some(now),
            },
            ports: NodePorts {
                inputs: vec!["input".to_string()],
                outputs: vec!["output".to_string()],
            },
            config: NodeConfig::default(),
        },
        style: NodeStyle::default(),
    }
}

/// Create an edge from `source` to `target`.
pub fn create_edge(
    source: &str,
    target: &str,
    condition: Option<&str>,
    operator: Option<&str>,
) -> Edge {
    Edge {
        id: format!("edge-{}", generate_id()),
        source: source.to_string(),
        target: target.to_string(),
        source_handle: None,
        target_handle: None,
        data: EdgeData {
            condition: condition.unwrap_or("follows").to_string(),
            operator: operator.unwrap_or("related").to_string(),
            weight: 1.0,
            metadata: EdgeMetadata {
                label: String::new(),
                description: String::new(),
                created_at: Some(Utc::now()),
                is_active: true,
            },
        },
        style: serde_json::Value::Null,
    }
}

/// Create an empty workflow titled `title`.
pub fn create_workflow(title: &str) -> Workflow {
    let now = Utc::now();
    Workflow {
        id: format!("workflow-{}", generate_id()),
        metadata: WorkflowMetadata {
            title: title.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            ..Default::default()
        },
        ..Default::default()
    }
}
