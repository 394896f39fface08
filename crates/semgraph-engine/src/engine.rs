use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use semgraph_core::config::{AppConfig, ExecutionOrder};
use semgraph_core::error::{Result, SemgraphError};
use semgraph_core::event::{BusEvent, EventBus};
use semgraph_core::store::KeyValueStore;
use semgraph_core::traits::ModelClient;
use semgraph_core::types::{
    CallRequest, CallResponse, ChatMessage, ExecutionRecord, ExecutionState, Node,
    NodeErrorRecord, NodeResult, SamplingParams, Workflow,
};
use semgraph_graph::resolve;
use semgraph_llm::{resolve_selection, ProviderRegistry};

use crate::progress::ProgressEvent;
use crate::state::NodeRuntimeState;

/// Placeholder for an upstream node that has no output yet.
pub const NO_OUTPUT: &str = "[No output]";

/// Aggregate result of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    /// True once the run has visited every node; per-node failures do not clear it.
    pub success: bool,
    pub results: Vec<NodeResult>,
    pub node_states: Vec<NodeRuntimeState>,
    pub total_nodes: usize,
    pub completed_nodes: usize,
    pub provider: String,
    pub model: String,
}

/// Drives each node of a workflow through the model client, one at a time.
pub struct ExecutionEngine {
    client: Arc<dyn ModelClient>,
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn KeyValueStore>,
    sampling: SamplingParams,
    order: ExecutionOrder,
    bus: Option<Arc<EventBus>>,
}

impl ExecutionEngine {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            client,
            registry,
            store,
            sampling: SamplingParams::default(),
            order: ExecutionOrder::default(),
            bus: None,
        }
    }

    /// Engine with the config's sampling defaults and ordering.
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn ModelClient>,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::new(client, registry, store)
            .with_sampling(config.sampling.clone())
            .with_order(config.engine.order)
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_order(mut self, order: ExecutionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Execute every node in resolver order.
    ///
    /// Fails before touching the workflow when it has no nodes, when no
    /// provider has a credential, or when topological ordering finds a
    /// cycle. Provider failures after that are recorded per node and the
    /// run continues.
    pub async fn execute_workflow<F>(
        &self,
        workflow: &mut Workflow,
        mut on_progress: F,
    ) -> Result<ExecutionSummary>
    where
        F: FnMut(ProgressEvent),
    {
        if workflow.nodes.is_empty() {
            return Err(SemgraphError::WorkflowEmpty);
        }
        let selection = resolve_selection(&self.registry, self.store.as_ref())?;
        let sequence = resolve(workflow, self.order)?;

        let total_nodes = sequence.len();
        info!(
            workflow_id = %workflow.id,
            nodes = total_nodes,
            provider = %selection.provider,
            model = %selection.model,
            "Starting workflow execution"
        );

        workflow.execution = ExecutionRecord {
            state: ExecutionState::Running,
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let mut states: HashMap<String, NodeRuntimeState> = sequence
            .iter()
            .filter_map(|id| workflow.node(id))
            .map(|n| (n.id.clone(), NodeRuntimeState::pending(&n.id, n.content())))
            .collect();
        let mut results: Vec<NodeResult> = Vec::new();

        on_progress(ProgressEvent::Start {
            message: format!("Executing {} nodes", total_nodes),
            total_nodes,
        });

        for node_id in &sequence {
            let Some(node) = workflow.node(node_id).cloned() else {
                continue;
            };
            workflow.execution.current_node = Some(node.id.clone());

            on_progress(ProgressEvent::NodeStart {
                node_id: node.id.clone(),
                message: format!("Executing {}", node.display_label()),
            });

            let input = compose_input(workflow, &node, &states);
            if let Some(state) = states.get_mut(&node.id) {
                state.input = input.clone();
                state.start();
            }

            let start = Instant::now();
            let outcome = self.call_model(input.clone()).await;
            let duration = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(reply) => {
                    debug!(node_id = %node.id, duration, "Node complete");
                    if let Some(state) = states.get_mut(&node.id) {
                        state.complete(reply.content.clone());
                    }
                    let result = NodeResult {
                        node_id: node.id.clone(),
                        node_label: node.display_label().to_string(),
                        node_type: node.node_type.clone(),
                        input,
                        output: reply.content,
                        duration,
                        provider: reply.provider,
                        model: reply.model,
                        usage: reply.usage,
                    };
                    results.push(result.clone());
                    on_progress(ProgressEvent::NodeComplete {
                        node_id: node.id.clone(),
                        message: format!("Completed {}", node.display_label()),
                        result,
                    });
                }
                Err(e) => {
                    error!(node_id = %node.id, error = %e, "Node failed");
                    let message = e.to_string();
                    if let Some(state) = states.get_mut(&node.id) {
                        state.fail(message.clone());
                    }
                    workflow.execution.errors.push(NodeErrorRecord {
                        node_id: node.id.clone(),
                        error: message.clone(),
                        timestamp: Utc::now(),
                    });
                    on_progress(ProgressEvent::NodeError {
                        node_id: node.id.clone(),
                        message: format!("Failed {}", node.display_label()),
                        error: message,
                    });
                }
            }
        }

        let completed_nodes = results.len();
        workflow.execution.state = ExecutionState::Completed;
        workflow.execution.current_node = None;
        workflow.execution.completed_at = Some(Utc::now());
        workflow.execution.results = results.clone();
        workflow.touch();

        if let Some(bus) = &self.bus {
            bus.publish(BusEvent::WorkflowUpdated {
                workflow_id: workflow.id.clone(),
            });
        }

        info!(
            workflow_id = %workflow.id,
            completed = completed_nodes,
            failed = total_nodes - completed_nodes,
            "Workflow execution complete"
        );
        on_progress(ProgressEvent::Complete {
            message: format!("Completed {} of {} nodes", completed_nodes, total_nodes),
            results: results.clone(),
        });

        let node_states = sequence
            .iter()
            .filter_map(|id| states.remove(id))
            .collect();

        Ok(ExecutionSummary {
            success: true,
            results,
            node_states,
            total_nodes,
            completed_nodes,
            provider: selection.provider,
            model: selection.model,
        })
    }

    /// Selection is re-read for every call; the store may change mid-run.
    async fn call_model(&self, input: String) -> Result<CallResponse> {
        let selection = resolve_selection(&self.registry, self.store.as_ref())?;
        let request = CallRequest::chat(
            selection.provider,
            selection.model,
            selection.credential,
            vec![ChatMessage::user(input)],
        )
        .with_params(self.sampling.clone());
        self.client.call(request).await
    }
}

/// Node content followed by one `Input from <source>: <output>` line per incoming edge.
pub fn compose_input(
    workflow: &Workflow,
    node: &Node,
    states: &HashMap<String, NodeRuntimeState>,
) -> String {
    let lines: Vec<String> = workflow
        .incoming_edges(&node.id)
        .map(|edge| {
            let output = states
                .get(&edge.source)
                .and_then(NodeRuntimeState::usable_output)
                .unwrap_or(NO_OUTPUT);
            format!("Input from {}: {}", edge.source, output)
        })
        .collect();

    if lines.is_empty() {
        return node.content().to_string();
    }
    if node.content().is_empty() {
        return lines.join("\n");
    }
    format!("{}\n\n{}", node.content(), lines.join("\n"))
}
