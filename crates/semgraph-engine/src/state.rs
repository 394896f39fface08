use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one node within a run: `pending → running → completed | error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Transient per-node record; exists only for the duration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRuntimeState {
    pub id: String,
    pub status: NodeStatus,
    pub input: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl NodeRuntimeState {
    pub fn pending(id: &str, input: &str) -> Self {
        Self {
            id: id.to_string(),
            status: NodeStatus::Pending,
            input: input.to_string(),
            output: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn start(&mut self) {
        self.status = NodeStatus::Running;
        self.start_time = Some(Utc::now());
    }

    pub fn complete(&mut self, output: String) {
        self.status = NodeStatus::Completed;
        self.output = Some(output);
        self.end_time = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = NodeStatus::Error;
        self.error = Some(error);
        self.end_time = Some(Utc::now());
    }

    /// Output usable by downstream nodes; only completed nodes have one.
    pub fn usable_output(&self) -> Option<&str> {
        match self.status {
            NodeStatus::Completed => self.output.as_deref(),
            _ => None,
        }
    }
}
