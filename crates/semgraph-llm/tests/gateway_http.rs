use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use semgraph_core::config::ProviderOverride;
use semgraph_core::error::SemgraphError;
use semgraph_core::store::{keys, KeyValueStore, MemoryStore};
use semgraph_core::traits::ModelClient;
use semgraph_core::types::{CallRequest, ChatMessage, Usage};
use semgraph_llm::{ProviderGateway, ProviderRegistry};
use semgraph_test_utils::seeded_store;

const KEY: &str = "sk-test-1234567890";

fn registry_at(base_url: &str, providers: &[&str]) -> Arc<ProviderRegistry> {
    let mut registry = ProviderRegistry::with_defaults();
    let overrides: HashMap<String, ProviderOverride> = providers
        .iter()
        .map(|p| {
            (
                p.to_string(),
                ProviderOverride {
                    base_url: Some(base_url.to_string()),
                    models: vec![],
                },
            )
        })
        .collect();
    registry.apply_overrides(&overrides);
    Arc::new(registry)
}

fn gateway(server: &MockServer, providers: &[&str], store: MemoryStore) -> ProviderGateway {
    ProviderGateway::new(registry_at(&server.uri(), providers), Arc::new(store))
}

fn hello() -> Vec<ChatMessage> {
    vec![ChatMessage::system("be brief"), ChatMessage::user("hello")]
}

#[tokio::test]
async fn rest_call_normalizes_reply_and_records_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", format!("Bearer {}", KEY).as_str()))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 1000})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, &["openai"], MemoryStore::new());
    let reply = gw.chat("openai", "gpt-4o-mini", KEY, hello()).await.unwrap();
    assert_eq!(reply.content, "Hi there");
    assert_eq!(reply.usage, Usage::new(9, 2));
    assert_eq!(reply.provider, "openai");

    let history = gw.history();
    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.status, Some(200));
    assert_eq!(record.method, "POST");
    assert!(record.url.ends_with("/chat/completions"));
    assert_eq!((record.input_tokens, record.output_tokens), (9, 2));

    let auth = record
        .headers
        .iter()
        .find(|(name, _)| name == "Authorization")
        .map(|(_, v)| v.as_str());
    assert_eq!(auth, Some("Bearer ***567890"));
    assert!(!format!("{:?}", record.headers).contains(KEY));

    gw.clear_history();
    assert!(gw.history().is_empty());
}

#[tokio::test]
async fn optional_headers_sent_when_stored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("X-Title", "semgraph"))
        .and(header("HTTP-Referer", "https://semgraph.local"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    store.set(&keys::header("openrouter", "X-Title"), "semgraph");
    store.set(&keys::header("openrouter", "HTTP-Referer"), "https://semgraph.local");

    let gw = gateway(&server, &["openrouter"], store);
    let reply = gw
        .chat("openrouter", "openai/gpt-4o-mini", KEY, hello())
        .await
        .unwrap();
    assert_eq!(reply.content, "ok");
    assert_eq!(reply.usage, Usage::default());
}

#[tokio::test]
async fn http_error_carries_status_message_and_meta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .insert_header("x-request-id", "req_abc")
                .insert_header("x-ratelimit-remaining-requests", "0")
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&server)
        .await;

    let gw = gateway(&server, &["groq"], MemoryStore::new());
    let err = gw
        .chat("groq", "llama-3.1-8b-instant", KEY, hello())
        .await
        .unwrap_err();

    match &err {
        SemgraphError::ProviderHttp {
            provider,
            status,
            message,
            meta,
        } => {
            assert_eq!(provider, "groq");
            assert_eq!(*status, 429);
            assert_eq!(message, "Rate limit reached");
            assert_eq!(meta.retry_after.as_deref(), Some("7"));
            assert_eq!(meta.request_id.as_deref(), Some("req_abc"));
            assert_eq!(meta.rate_limit_remaining.as_deref(), Some("0"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.to_string(), "groq API error (429): Rate limit reached");
    assert_eq!(gw.history()[0].status, Some(429));
}

#[tokio::test]
async fn prompt_only_request_uses_completions_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"prompt": "Once upon"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"text": " a time"}],
            "usage": {"prompt_tokens": 2, "completion_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, &["together"], MemoryStore::new());
    let mut request = CallRequest::chat("together", "m", KEY, vec![]);
    request.prompt = Some("Once upon".into());
    let reply = gw.send(request).await.unwrap();
    assert_eq!(reply.content, " a time");
}

#[tokio::test]
async fn anthropic_uses_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", KEY))
        .and(body_partial_json(json!({"system": "be brief"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Hello"}],
            "usage": {"input_tokens": 4, "output_tokens": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server, &["anthropic"], MemoryStore::new());
    let reply = gw
        .chat("anthropic", "claude-3-5-haiku-latest", KEY, hello())
        .await
        .unwrap();
    assert_eq!(reply.content, "Hello");
    assert_eq!(reply.usage, Usage::new(4, 1));

    let masked = &gw.history()[0].headers;
    assert!(masked.iter().any(|(n, v)| n == "x-api-key" && v == "***567890"));
}

#[tokio::test]
async fn token_stream_is_accumulated() {
    let server = MockServer::start().await;
    let body = "event: token\ndata: \"Hel\"\n\n\
                event: token\ndata: {\"token\":\"lo\"}\n\n\
                event: usage\ndata: {\"input_tokens\":6,\"output_tokens\":2}\n\n\
                event: done\ndata: {}\n\n";
    Mock::given(method("POST"))
        .and(path("/generate_stream"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let gw = gateway(&server, &["textgen"], MemoryStore::new());
    let reply = gw.chat("textgen", "default", KEY, hello()).await.unwrap();
    assert_eq!(reply.content, "Hello");
    assert_eq!(reply.usage, Usage::new(6, 2));
}

#[tokio::test]
async fn stream_error_event_fails_the_whole_call() {
    let server = MockServer::start().await;
    let body = "event: token\ndata: partial\n\nevent: error\ndata: {\"message\":\"out of memory\"}\n\n";
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let gw = gateway(&server, &["textgen"], MemoryStore::new());
    let err = gw.chat("textgen", "default", KEY, hello()).await.unwrap_err();
    match err {
        SemgraphError::ProviderStream { provider, message } => {
            assert_eq!(provider, "textgen");
            assert_eq!(message, "out of memory");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_is_recorded_without_status() {
    let registry = registry_at("http://127.0.0.1:9", &["mistral"]);
    let gw = ProviderGateway::new(registry, Arc::new(MemoryStore::new()));
    let err = gw
        .chat("mistral", "mistral-small-latest", KEY, hello())
        .await
        .unwrap_err();
    assert!(matches!(err, SemgraphError::ProviderTransport { .. }));
    assert_eq!(gw.history()[0].status, None);
}

#[tokio::test]
async fn unknown_provider_is_rejected_before_io() {
    let gw = ProviderGateway::new(
        Arc::new(ProviderRegistry::with_defaults()),
        Arc::new(MemoryStore::new()),
    );
    let err = gw.chat("nope", "m", KEY, hello()).await.unwrap_err();
    assert!(matches!(err, SemgraphError::UnknownProvider(_)));
    assert!(gw.history().is_empty());
}

#[tokio::test]
async fn gateway_as_model_client_uses_selection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "deepseek-chat"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "from deepseek"}}]
        })))
        .mount(&server)
        .await;

    let gw = gateway(&server, &["deepseek"], seeded_store("deepseek", KEY));
    let selection = gw.selection().unwrap();
    assert_eq!(selection.provider, "deepseek");

    let client: Arc<dyn ModelClient> = Arc::new(gw);
    let request = CallRequest::chat(
        selection.provider,
        selection.model,
        selection.credential,
        hello(),
    );
    let reply = client.call(request).await.unwrap();
    assert_eq!(reply.content, "from deepseek");
}
