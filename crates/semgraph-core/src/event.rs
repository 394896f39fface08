use serde::{Deserialize, Serialize};

/// Cross-component notification carried by the [`EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum BusEvent {
    WorkflowUpdated { workflow_id: String },
    OpenNodeEditor { node_id: String },
    OpenEdgeEditor { edge_id: String },
}

impl BusEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BusEvent::WorkflowUpdated { .. } => "workflow_updated",
            BusEvent::OpenNodeEditor { .. } => "open_node_editor",
            BusEvent::OpenEdgeEditor { .. } => "open_edge_editor",
        }
    }
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events; filter by [`BusEvent::topic`].
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: BusEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
