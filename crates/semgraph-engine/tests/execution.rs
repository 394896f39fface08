use std::sync::Arc;

use semgraph_core::config::ExecutionOrder;
use semgraph_core::error::SemgraphError;
use semgraph_core::event::{BusEvent, EventBus};
use semgraph_core::store::MemoryStore;
use semgraph_core::types::{ExecutionState, SamplingParams, Workflow};
use semgraph_engine::{ExecutionEngine, NodeStatus, ProgressEvent};
use semgraph_llm::ProviderRegistry;
use semgraph_test_utils::{linear_workflow, seeded_store, wired_workflow, StubModelClient};

fn engine_with(client: Arc<StubModelClient>, store: MemoryStore) -> ExecutionEngine {
    ExecutionEngine::new(
        client,
        Arc::new(ProviderRegistry::with_defaults()),
        Arc::new(store),
    )
}

fn engine(client: Arc<StubModelClient>) -> ExecutionEngine {
    engine_with(client, seeded_store("openai", "sk-test"))
}

async fn run(engine: &ExecutionEngine, workflow: &mut Workflow) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    engine
        .execute_workflow(workflow, |e| events.push(e))
        .await
        .unwrap();
    events
}

#[tokio::test]
async fn every_node_completes_without_edges() {
    for n in [1usize, 3, 7] {
        let labels: Vec<String> = (0..n).map(|i| format!("n{}", i)).collect();
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let mut workflow = linear_workflow("Flat", &refs);

        let client = Arc::new(StubModelClient::echo());
        let summary = engine(client.clone())
            .execute_workflow(&mut workflow, |_| {})
            .await
            .unwrap();

        assert!(summary.success);
        assert_eq!(summary.total_nodes, n);
        assert_eq!(summary.completed_nodes, n);
        assert_eq!(summary.results.len(), n);
        assert_eq!(client.call_count(), n);
    }
}

#[tokio::test]
async fn empty_workflow_rejected_before_any_call() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = Workflow::default();
    let err = engine(client.clone())
        .execute_workflow(&mut workflow, |_| panic!("no progress expected"))
        .await
        .unwrap_err();

    assert!(matches!(err, SemgraphError::WorkflowEmpty));
    assert!(err.is_precondition());
    assert_eq!(client.call_count(), 0);
    assert_eq!(workflow.execution.state, ExecutionState::Idle);
}

#[tokio::test]
async fn missing_credential_rejected_before_any_call() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = linear_workflow("W", &["A"]);
    let err = engine_with(client.clone(), MemoryStore::new())
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, SemgraphError::NoProviderConfigured));
    assert_eq!(client.call_count(), 0);
    assert!(workflow.execution.started_at.is_none());
}

#[tokio::test]
async fn upstream_output_flows_downstream() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = wired_workflow("W", &["A", "B"], &[("A", "B")]);
    let summary = engine(client)
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();

    let a_output = &summary.results[0].output;
    assert_eq!(a_output, "echo: content of A");
    let b_input = &summary.results[1].input;
    assert!(b_input.starts_with("content of B"));
    assert!(b_input.contains(&format!("Input from A: {}", a_output)));
}

#[tokio::test]
async fn downstream_declared_first_sees_placeholder() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = wired_workflow("W", &["B", "A"], &[("A", "B")]);
    let summary = engine(client)
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();

    assert_eq!(summary.results[0].node_id, "B");
    assert!(summary.results[0].input.contains("Input from A: [No output]"));
    assert_eq!(summary.completed_nodes, 2);
}

#[tokio::test]
async fn topological_order_runs_producers_first() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = wired_workflow("W", &["B", "A"], &[("A", "B")]);
    let summary = engine(client)
        .with_order(ExecutionOrder::Topological)
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();

    assert_eq!(summary.results[0].node_id, "A");
    assert!(summary.results[1]
        .input
        .contains("Input from A: echo: content of A"));
}

#[tokio::test]
async fn cycle_rejected_in_topological_mode() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = wired_workflow("W", &["A", "B"], &[("A", "B"), ("B", "A")]);
    let err = engine(client.clone())
        .with_order(ExecutionOrder::Topological)
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, SemgraphError::CycleDetected { .. }));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn failing_node_does_not_abort_run() {
    let client = Arc::new(StubModelClient::echo().then_fail("model overloaded"));
    let mut workflow = wired_workflow("W", &["A", "B", "C"], &[("A", "B")]);

    let mut events = Vec::new();
    let summary = engine(client.clone())
        .execute_workflow(&mut workflow, |e| events.push(e))
        .await
        .unwrap();

    assert!(summary.success);
    assert_eq!(client.call_count(), 3);
    assert_eq!(summary.total_nodes, 3);
    assert_eq!(summary.completed_nodes, 2);
    assert_eq!(summary.node_states.len(), 3);

    let a = &summary.node_states[0];
    assert_eq!(a.status, NodeStatus::Error);
    assert!(a.error.as_deref().unwrap().contains("model overloaded"));
    assert!(summary.results[0].input.contains("Input from A: [No output]"));

    let errors: Vec<&ProgressEvent> = events
        .iter()
        .filter(|e| e.kind() == "node_error")
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].node_id(), Some("A"));

    assert_eq!(workflow.execution.errors.len(), 1);
    assert_eq!(workflow.execution.errors[0].node_id, "A");
}

#[tokio::test]
async fn progress_events_arrive_in_order() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = linear_workflow("W", &["A", "B"]);
    let events = run(&engine(client), &mut workflow).await;

    let kinds: Vec<&str> = events.iter().map(ProgressEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "start",
            "node_start",
            "node_complete",
            "node_start",
            "node_complete",
            "complete"
        ]
    );
    match events.last().unwrap() {
        ProgressEvent::Complete { results, .. } => assert_eq!(results.len(), 2),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn workflow_record_and_states_updated() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = linear_workflow("W", &["A", "B"]);
    let summary = engine(client)
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();

    let record = &workflow.execution;
    assert_eq!(record.state, ExecutionState::Completed);
    assert!(record.current_node.is_none());
    assert!(record.completed_at >= record.started_at);
    assert_eq!(record.results, summary.results);

    for state in &summary.node_states {
        assert_eq!(state.status, NodeStatus::Completed);
        assert!(state.start_time.is_some() && state.end_time.is_some());
    }
    assert_eq!(summary.provider, "openai");
    assert_eq!(summary.model, "gpt-4o-mini");
}

#[tokio::test]
async fn requests_use_selection_and_default_sampling() {
    let client = Arc::new(StubModelClient::echo());
    let store = seeded_store("mistral", "m-key");
    store_set(&store, "model:mistral", "mistral-large-latest");
    let mut workflow = linear_workflow("W", &["A"]);
    engine_with(client.clone(), store)
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();

    let request = &client.requests()[0];
    assert_eq!(request.provider, "mistral");
    assert_eq!(request.model, "mistral-large-latest");
    assert_eq!(request.credential, "m-key");
    assert_eq!(request.params, SamplingParams::default());
    assert_eq!(request.params.max_tokens, 1000);
}

#[tokio::test]
async fn sampling_override_is_applied() {
    let client = Arc::new(StubModelClient::echo());
    let sampling = SamplingParams {
        temperature: 0.1,
        max_tokens: 64,
        top_p: 0.9,
    };
    let mut workflow = linear_workflow("W", &["A"]);
    engine(client.clone())
        .with_sampling(sampling.clone())
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();
    assert_eq!(client.requests()[0].params, sampling);
}

#[tokio::test]
async fn bus_receives_workflow_updated() {
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = linear_workflow("W", &["A"]);
    let id = workflow.id.clone();

    engine(client)
        .with_bus(bus.clone())
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event, BusEvent::WorkflowUpdated { workflow_id: id });
    assert_eq!(event.topic(), "workflow_updated");
}

#[tokio::test]
async fn duplicate_node_id_runs_once() {
    let client = Arc::new(StubModelClient::echo());
    let mut workflow = linear_workflow("W", &["A", "B", "A"]);
    let summary = engine(client.clone())
        .execute_workflow(&mut workflow, |_| {})
        .await
        .unwrap();

    assert_eq!(client.call_count(), 2);
    assert_eq!(summary.total_nodes, 2);
    assert_eq!(summary.completed_nodes, 2);
    assert_eq!(summary.node_states.len(), 2);
}

fn store_set(store: &MemoryStore, key: &str, value: &str) {
    use semgraph_core::store::KeyValueStore;
    store.set(key, value);
}
