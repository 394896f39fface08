//! Shared test utilities: a scripted model client, seeded stores and
//! workflow fixtures.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;

use semgraph_core::error::{Result, SemgraphError};
use semgraph_core::store::{keys, KeyValueStore, MemoryStore};
use semgraph_core::traits::ModelClient;
use semgraph_core::types::{CallRequest, CallResponse, Position, Role, Usage, Workflow};
use semgraph_core::StaticCatalog;
use semgraph_graph::{create_edge, create_node, create_workflow};

/// Usage reported by every stubbed reply.
pub const STUB_USAGE: Usage = Usage { input: 10, output: 5 };

#[derive(Debug, Clone)]
enum Reply {
    Content(String),
    Echo,
    Fail(String),
}

/// A `ModelClient` that answers from a script.
///
/// Scripted replies are consumed in order; once the script is empty the
/// fallback reply is used for every further call.
pub struct StubModelClient {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<CallRequest>>,
}

impl StubModelClient {
    fn with_fallback(fallback: Reply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies `echo: <last user message>`.
    pub fn echo() -> Self {
        Self::with_fallback(Reply::Echo)
    }

    pub fn replying(content: &str) -> Self {
        Self::with_fallback(Reply::Content(content.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_fallback(Reply::Fail(message.to_string()))
    }

    pub fn then_reply(self, content: &str) -> Self {
        self.push(Reply::Content(content.to_string()))
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.push(Reply::Fail(message.to_string()))
    }

    fn push(self, reply: Reply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CallRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl ModelClient for StubModelClient {
    fn call(&self, request: CallRequest) -> BoxFuture<'_, Result<CallResponse>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            let content = match self.next_reply() {
                Reply::Content(c) => c,
                Reply::Echo => {
                    let last = request
                        .messages
                        .iter()
                        .rev()
                        .find(|m| m.role == Role::User)
                        .map(|m| m.content.clone())
                        .or(request.prompt.clone())
                        .unwrap_or_default();
                    format!("echo: {}", last)
                }
                Reply::Fail(message) => {
                    return Err(SemgraphError::ProviderHttp {
                        provider: request.provider,
                        status: 500,
                        message,
                        meta: Default::default(),
                    })
                }
            };

            Ok(CallResponse {
                content,
                usage: STUB_USAGE,
                provider: request.provider,
                model: request.model,
            })
        })
    }
}

/// Store holding one credential, as a settings dialog would leave it.
pub fn seeded_store(provider: &str, api_key: &str) -> MemoryStore {
    let store = MemoryStore::new();
    store.set(&keys::api_key(provider), api_key);
    store
}

/// Workflow with one `concept` node per label and no edges.
pub fn linear_workflow(title: &str, labels: &[&str]) -> Workflow {
    let catalog = StaticCatalog::builtin();
    let mut workflow = create_workflow(title);
    for (i, label) in labels.iter().enumerate() {
        let mut node = create_node(
            &catalog,
            "concept",
            Position::new(i as f64 * 400.0, 0.0),
            &format!("content of {}", label),
        );
        node.id = label.to_string();
        node.data.label = label.to_string();
        workflow.nodes.push(node);
    }
    workflow
}

/// `linear_workflow` plus the given `(source, target)` edges.
pub fn wired_workflow(title: &str, labels: &[&str], edges: &[(&str, &str)]) -> Workflow {
    let mut workflow = linear_workflow(title, labels);
    for (source, target) in edges {
        workflow.edges.push(create_edge(source, target, None, None));
    }
    workflow
}

/// Write `content` to a named temp file and keep it alive with the handle.
pub fn temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}
