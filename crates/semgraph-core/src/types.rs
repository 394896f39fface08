use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Graph model ──────────────────────────────────────────────────

/// Canvas coordinates of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Value type of a node field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Tags,
    LongText,
}

/// A named, typed field carried by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl NodeField {
    pub fn new(name: impl Into<String>, kind: FieldKind, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeMetadata {
    pub cluster: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePorts {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Execution-related flags of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeConfig {
    pub is_executable: bool,
    pub requires_input: bool,
    pub max_inputs: u32,
    pub max_outputs: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            is_executable: true,
            requires_input: false,
            max_inputs: 10,
            max_outputs: 10,
        }
    }
}

/// Content payload of a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    pub title: String,
    pub tags: Vec<String>,
    pub description: String,
    pub content: String,
    pub language: String,
    pub fields: Vec<NodeField>,
    pub metadata: NodeMetadata,
    pub ports: NodePorts,
    pub config: NodeConfig,
}

pub const DEFAULT_NODE_WIDTH: f64 = 320.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 220.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStyle {
    pub width: f64,
    pub height: f64,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
        }
    }
}

/// A typed unit of content in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub data: NodeData,
    #[serde(default)]
    pub style: NodeStyle,
}

impl Node {
    /// The text that is sent to a model when this node executes.
    pub fn content(&self) -> &str {
        &self.data.content
    }

    /// Label, falling back to title and then id.
    pub fn display_label(&self) -> &str {
        if !self.data.label.is_empty() {
            &self.data.label
        } else if !self.data.title.is_empty() {
            &self.data.title
        } else {
            &self.id
        }
    }

    pub fn field(&self, name: &str) -> Option<&NodeField> {
        self.data.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EdgeMetadata {
    pub label: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Default for EdgeMetadata {
    fn default() -> Self {
        Self {
            label: String::new(),
            description: String::new(),
            created_at: None,
            is_active: true,
        }
    }
}

/// Semantic payload of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeData {
    pub condition: String,
    pub operator: String,
    pub weight: f64,
    pub metadata: EdgeMetadata,
}

impl Default for EdgeData {
    fn default() -> Self {
        Self {
            condition: "follows".to_string(),
            operator: "related".to_string(),
            weight: 1.0,
            metadata: EdgeMetadata::default(),
        }
    }
}

/// A directed, weighted relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub data: EdgeData,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub style: serde_json::Value,
}

impl Edge {
    /// Relation label used by exporters: explicit label, else the operator.
    pub fn relation(&self) -> &str {
        if self.data.metadata.label.is_empty() {
            &self.data.operator
        } else {
            &self.data.metadata.label
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowMetadata {
    pub title: String,
    pub description: String,
    pub author: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Workflow-level execution state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

/// Per-node failure recorded on the workflow after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeErrorRecord {
    pub node_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub state: ExecutionState,
    pub current_node: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Vec<NodeResult>,
    pub errors: Vec<NodeErrorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

pub const WORKFLOW_VERSION: &str = "1.0.0";

/// A graph of nodes and edges plus its execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub execution: ExecutionRecord,
    #[serde(default)]
    pub viewport: Viewport,
}

fn default_version() -> String {
    WORKFLOW_VERSION.to_string()
}

impl Default for Workflow {
    fn default() -> Self {
        Self {
            id: String::new(),
            version: default_version(),
            metadata: WorkflowMetadata::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            execution: ExecutionRecord::default(),
            viewport: Viewport::default(),
        }
    }
}

impl Workflow {
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Edges whose target is `id`, in edge-array order.
    pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Remove a node together with every edge attached to it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let pos = self.nodes.iter().position(|n| n.id == id)?;
        self.edges.retain(|e| e.source != id && e.target != id);
        Some(self.nodes.remove(pos))
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let pos = self.edges.iter().position(|e| e.id == id)?;
        Some(self.edges.remove(pos))
    }

    pub fn touch(&mut self) {
        self.metadata.updated_at = Some(Utc::now());
    }
}

// ── Model calls ──────────────────────────────────────────────────

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Normalized token usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(rename = "in")]
    pub input: u64,
    #[serde(rename = "out")]
    pub output: u64,
}

impl Usage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// Sampling parameters applied to every model call unless overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 1.0,
        }
    }
}

/// A fully resolved request to one provider.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub provider: String,
    pub model: String,
    pub credential: String,
    /// Chat messages. When empty, `prompt` is sent as a single completion prompt.
    pub messages: Vec<ChatMessage>,
    pub prompt: Option<String>,
    pub params: SamplingParams,
}

impl CallRequest {
    pub fn chat(
        provider: impl Into<String>,
        model: impl Into<String>,
        credential: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            credential: credential.into(),
            messages,
            prompt: None,
            params: SamplingParams::default(),
        }
    }

    pub fn with_params(mut self, params: SamplingParams) -> Self {
        self.params = params;
        self
    }
}

/// Normalized provider reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    pub content: String,
    pub usage: Usage,
    pub provider: String,
    pub model: String,
}

// ── Execution records ────────────────────────────────────────────

/// Record of one successfully executed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub node_id: String,
    pub node_label: String,
    pub node_type: String,
    pub input: String,
    pub output: String,
    /// Wall time of the provider call in milliseconds.
    pub duration: u64,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
}
