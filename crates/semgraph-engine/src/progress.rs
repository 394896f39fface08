use serde::Serialize;

use semgraph_core::types::NodeResult;

/// Progress notification delivered to the caller during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Start {
        message: String,
        #[serde(rename = "totalNodes")]
        total_nodes: usize,
    },
    NodeStart {
        #[serde(rename = "nodeId")]
        node_id: String,
        message: String,
    },
    NodeComplete {
        #[serde(rename = "nodeId")]
        node_id: String,
        message: String,
        result: NodeResult,
    },
    NodeError {
        #[serde(rename = "nodeId")]
        node_id: String,
        message: String,
        error: String,
    },
    Complete {
        message: String,
        results: Vec<NodeResult>,
    },
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::NodeStart { .. } => "node_start",
            Self::NodeComplete { .. } => "node_complete",
            Self::NodeError { .. } => "node_error",
            Self::Complete { .. } => "complete",
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStart { node_id, .. }
            | Self::NodeComplete { node_id, .. }
            | Self::NodeError { node_id, .. } => Some(node_id),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Start { message, .. }
            | Self::NodeStart { message, .. }
            | Self::NodeComplete { message, .. }
            | Self::NodeError { message, .. }
            | Self::Complete { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let event = ProgressEvent::NodeError {
            node_id: "n1".into(),
            message: "Node failed".into(),
            error: "boom".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "node_error");
        assert_eq!(json["nodeId"], "n1");
        assert_eq!(json["error"], "boom");
        assert_eq!(event.kind(), "node_error");
    }
}
