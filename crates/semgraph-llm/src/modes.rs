//! The three prompt-assembly modes: convert text to a graph, execute a
//! whole graph, and enhance one node's content.
//!
//! Every mode returns a [`ModeOutcome`]; provider and template errors are
//! folded into `Failure` so callers always get a tagged result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use semgraph_codec::ExportFormat;
use semgraph_core::error::Result;
use semgraph_core::ontology::{NodeTypeInfo, OntologyCatalog, FREEFORM_TYPE};
use semgraph_core::store::KeyValueStore;
use semgraph_core::traits::ModelClient;
use semgraph_core::types::{CallRequest, CallResponse, ChatMessage, Position, SamplingParams, Usage, Workflow};
use semgraph_graph::{create_edge, create_node, create_workflow};

use crate::prompts::{render, OntologyPolicy, PromptLibrary};
use crate::providers::ProviderRegistry;
use crate::selection::resolve_selection;

pub const DEFAULT_ONTOLOGY_LIMIT: usize = 20;

const GRID_COLUMNS: usize = 3;
const GRID_ORIGIN: f64 = 50.0;
const GRID_STEP_X: f64 = 400.0;
const GRID_STEP_Y: f64 = 300.0;

/// Tagged result of a prompt mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ModeOutcome<T> {
    Success(T),
    Failure { error: String },
}

impl<T> ModeOutcome<T> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }

    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failure { error } => Err(error),
        }
    }
}

/// `{"success": true, ...payload}` or `{"success": false, "error": ...}`.
impl<T: Serialize> Serialize for ModeOutcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Success(payload) => {
                let value = serde_json::to_value(payload).map_err(S::Error::custom)?;
                let fields = match value {
                    Value::Object(map) => map,
                    other => {
                        let mut map = Map::new();
                        map.insert("result".to_string(), other);
                        map
                    }
                };
                let mut out = serializer.serialize_map(Some(fields.len() + 1))?;
                out.serialize_entry("success", &true)?;
                for (k, v) in &fields {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Self::Failure { error } => {
                let mut out = serializer.serialize_map(Some(2))?;
                out.serialize_entry("success", &false)?;
                out.serialize_entry("error", error)?;
                out.end()
            }
        }
    }
}

// ── Convert ──────────────────────────────────────────────────────

/// Which part of the catalog is shown to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum OntologySelection {
    None,
    Explicit {
        clusters: Vec<String>,
        types: Vec<String>,
    },
    /// The first `limit` catalog entries.
    Default { limit: usize },
}

impl Default for OntologySelection {
    fn default() -> Self {
        Self::Default {
            limit: DEFAULT_ONTOLOGY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOptions {
    pub policy: OntologyPolicy,
    pub selection: OntologySelection,
}

/// A node as proposed by the model, before ids and layout are assigned.
///
/// Models name the same attribute several ways and sometimes send more
/// than one spelling at once; the first non-empty synonym wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct DraftNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub content: String,
    pub cluster: String,
}

impl From<Map<String, Value>> for DraftNode {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            id: text_field(&map, &["id", "key"]),
            node_type: text_field(&map, &["type", "nodeType", "node_type"]),
            label: text_field(&map, &["label", "title", "name"]),
            content: text_field(&map, &["content", "text", "body"]),
            cluster: text_field(&map, &["cluster"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct DraftEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub condition: String,
}

impl From<Map<String, Value>> for DraftEdge {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            source: text_field(&map, &["source", "from"]),
            target: text_field(&map, &["target", "to"]),
            relation: text_field(&map, &["relation", "label", "operator", "type"]),
            condition: text_field(&map, &["condition"]),
        }
    }
}

/// First non-empty value among `names`. Numbers and booleans are
/// stringified (models sometimes emit numeric ids); anything else is skipped.
fn text_field(map: &Map<String, Value>, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| match map.get(*name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .next()
        .unwrap_or_default()
}

/// Parsed reply of convert mode.
///
/// `error` is set when the reply held no usable graph; `nodes` and
/// `edges` are then empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertedGraph {
    #[serde(default)]
    pub nodes: Vec<DraftNode>,
    #[serde(default)]
    pub edges: Vec<DraftEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConvertedGraph {
    fn unparsed(reason: impl Into<String>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            error: Some(reason.into()),
        }
    }

    /// Parse the first balanced `{...}` span of a model reply.
    pub fn from_reply(reply: &str) -> Self {
        let Some(span) = extract_json_object(reply) else {
            return Self::unparsed("Model reply contained no JSON object");
        };
        match serde_json::from_str::<ConvertedGraph>(span) {
            Ok(mut graph) => {
                graph.error = None;
                graph
            }
            Err(e) => Self::unparsed(format!("Model reply is not a valid graph: {}", e)),
        }
    }

    /// Build a workflow: fresh ids, grid layout, edges remapped onto the new ids.
    pub fn materialize(&self, catalog: &dyn OntologyCatalog, title: &str) -> Workflow {
        let mut workflow = create_workflow(title);
        let mut ids: HashMap<String, String> = HashMap::new();

        for (i, draft) in self.nodes.iter().enumerate() {
            let node_type = if draft.node_type.trim().is_empty() {
                FREEFORM_TYPE
            } else {
                draft.node_type.trim()
            };
            let position = Position::new(
                GRID_ORIGIN + (i % GRID_COLUMNS) as f64 * GRID_STEP_X,
                GRID_ORIGIN + (i / GRID_COLUMNS) as f64 * GRID_STEP_Y,
            );
            let mut node = create_node(catalog, node_type, position, &draft.content);
            if !draft.label.trim().is_empty() {
                node.data.label = draft.label.clone();
                node.data.title = draft.label.clone();
            }
            if catalog.lookup(node_type).is_none() && !draft.cluster.is_empty() {
                node.data.metadata.cluster = draft.cluster.clone();
            }

            let key = if draft.id.is_empty() {
                i.to_string()
            } else {
                draft.id.clone()
            };
            ids.insert(key, node.id.clone());
            workflow.nodes.push(node);
        }

        for draft in &self.edges {
            let (Some(source), Some(target)) = (ids.get(&draft.source), ids.get(&draft.target)) else {
                warn!(source = %draft.source, target = %draft.target, "Dropping edge with unknown endpoint");
                continue;
            };
            let relation = (!draft.relation.is_empty()).then_some(draft.relation.as_str());
            let condition = (!draft.condition.is_empty()).then_some(draft.condition.as_str());
            let mut edge = create_edge(source, target, condition, relation);
            edge.data.metadata.label = draft.relation.clone();
            workflow.edges.push(edge);
        }

        workflow
    }
}

/// First balanced `{...}` span, skipping braces inside JSON strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Execute ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedGraph {
    pub execution: GraphExecution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphExecution {
    /// Model reply, verbatim.
    pub result: String,
    pub format: String,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
}

// ── Enhance ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enhancement {
    pub enhanced_content: String,
    pub variant: String,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
}

/// Prompt assembly and dispatch for the three modes.
pub struct PromptModes {
    client: Arc<dyn ModelClient>,
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn KeyValueStore>,
    catalog: Arc<dyn OntologyCatalog>,
    library: PromptLibrary,
    sampling: SamplingParams,
}

impl PromptModes {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn KeyValueStore>,
        catalog: Arc<dyn OntologyCatalog>,
    ) -> Self {
        Self {
            client,
            registry,
            store,
            catalog,
            library: PromptLibrary::builtin(),
            sampling: SamplingParams::default(),
        }
    }

    pub fn with_library(mut self, library: PromptLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn library(&self) -> &PromptLibrary {
        &self.library
    }

    pub fn catalog(&self) -> &dyn OntologyCatalog {
        self.catalog.as_ref()
    }

    /// Add or replace an enhancement variant.
    pub fn register_variant(&mut self, name: &str, instruction: &str) {
        self.library
            .enhance
            .variants
            .insert(name.trim().to_string(), instruction.to_string());
    }

    pub fn variants(&self) -> Vec<&str> {
        self.library.enhance.variants.keys().map(String::as_str).collect()
    }

    async fn complete(&self, system: String, user: String) -> Result<CallResponse> {
        let selection = resolve_selection(&self.registry, self.store.as_ref())?;
        let request = CallRequest::chat(
            selection.provider,
            selection.model,
            selection.credential,
            vec![ChatMessage::system(system), ChatMessage::user(user)],
        )
        .with_params(self.sampling.clone());
        self.client.call(request).await
    }

    pub async fn convert_text(&self, text: &str, options: &ConvertOptions) -> ModeOutcome<ConvertedGraph> {
        if text.trim().is_empty() {
            return ModeOutcome::failure("No text to convert");
        }
        match self.try_convert(text, options).await {
            Ok(graph) => {
                debug!(nodes = graph.nodes.len(), edges = graph.edges.len(), "Converted text");
                ModeOutcome::Success(graph)
            }
            Err(e) => {
                warn!(error = %e, "Convert failed");
                ModeOutcome::failure(e.to_string())
            }
        }
    }

    async fn try_convert(&self, text: &str, options: &ConvertOptions) -> Result<ConvertedGraph> {
        let template = &self.library.convert;
        let policy = template.variant(options.policy.as_str()).unwrap_or_default();
        let ontology = match options.policy {
            OntologyPolicy::Exclude => String::new(),
            _ => ontology_excerpt(self.ontology_entries(&options.selection)),
        };

        let system = render(&template.system, &[("policy", policy)])?;
        let user = render(&template.user, &[("text", text), ("ontology", ontology.as_str())])?;
        let reply = self.complete(system, user).await?;
        Ok(ConvertedGraph::from_reply(&reply.content))
    }

    fn ontology_entries(&self, selection: &OntologySelection) -> Vec<&NodeTypeInfo> {
        let entries = self.catalog.entries();
        match selection {
            OntologySelection::None => Vec::new(),
            OntologySelection::Explicit { clusters, types } => entries
                .iter()
                .filter(|e| clusters.contains(&e.cluster) || types.contains(&e.code))
                .collect(),
            OntologySelection::Default { limit } => entries.iter().take(*limit).collect(),
        }
    }

    pub async fn execute_graph(&self, workflow: &Workflow, format: ExportFormat) -> ModeOutcome<ExecutedGraph> {
        if workflow.nodes.is_empty() {
            return ModeOutcome::failure("Workflow has no nodes to execute");
        }
        match self.try_execute(workflow, format).await {
            Ok(executed) => ModeOutcome::Success(executed),
            Err(e) => {
                warn!(error = %e, "Graph execution failed");
                ModeOutcome::failure(e.to_string())
            }
        }
    }

    async fn try_execute(&self, workflow: &Workflow, format: ExportFormat) -> Result<ExecutedGraph> {
        let graph = semgraph_codec::render(workflow, format, Utc::now())?;
        let catalog = catalog_summary(self.catalog.entries());

        let template = &self.library.execute;
        let system = render(&template.system, &[])?;
        let user = render(
            &template.user,
            &[
                ("format", format.key()),
                ("graph", graph.as_str()),
                ("catalog", catalog.as_str()),
            ],
        )?;
        let reply = self.complete(system, user).await?;

        Ok(ExecutedGraph {
            execution: GraphExecution {
                result: reply.content,
                format: format.key().to_string(),
                provider: reply.provider,
                model: reply.model,
                usage: reply.usage,
            },
        })
    }

    pub async fn enhance_node(&self, content: &str, variant: &str) -> ModeOutcome<Enhancement> {
        if content.trim().is_empty() {
            return ModeOutcome::failure("Node has no content to enhance");
        }
        let Some(instruction) = self.library.enhance.variant(variant) else {
            return ModeOutcome::failure(format!("Unknown enhancement variant: {}", variant));
        };

        let template = &self.library.enhance;
        let prompts = render(&template.system, &[]).and_then(|system| {
            render(&template.user, &[("instruction", instruction), ("content", content)])
                .map(|user| (system, user))
        });
        let (system, user) = match prompts {
            Ok(p) => p,
            Err(e) => return ModeOutcome::failure(e.to_string()),
        };

        match self.complete(system, user).await {
            Ok(reply) => ModeOutcome::Success(Enhancement {
                enhanced_content: reply.content,
                variant: variant.to_string(),
                provider: reply.provider,
                model: reply.model,
                usage: reply.usage,
            }),
            Err(e) => {
                warn!(variant, error = %e, "Enhance failed");
                ModeOutcome::failure(e.to_string())
            }
        }
    }
}

fn ontology_excerpt(entries: Vec<&NodeTypeInfo>) -> String {
    if entries.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nOntology types:\n");
    for e in entries {
        out.push_str(&format!("- {} [{}]: {}", e.code, e.cluster, e.name));
        if !e.description.is_empty() {
            out.push_str(&format!(" - {}", e.description));
        }
        out.push('\n');
    }
    out
}

fn catalog_summary(entries: &[NodeTypeInfo]) -> String {
    entries
        .iter()
        .map(|e| format!("- {}: {} ({})", e.code, e.name, e.cluster))
        .collect::<Vec<_>>()
        .join("\n")
}
