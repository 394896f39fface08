pub mod anthropic;
pub mod openai;
pub mod presets;
pub mod textgen;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use semgraph_core::config::ProviderOverride;
use semgraph_core::error::{Result, SemgraphError};
use semgraph_core::store::KeyValueStore;
use semgraph_core::types::{CallRequest, Usage};

use crate::usage::extract_usage;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiCompatible;
pub use textgen::TextGenAdapter;

/// How a provider delivers its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// One JSON response body.
    Rest,
    /// An event-stream of `token` events.
    TokenStream,
}

/// Endpoint and model list of a registered provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub models: Vec<String>,
}

/// Path (relative to the base URL) and JSON body of one provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub path: String,
    pub payload: Value,
}

/// Per-provider request shaping and response normalization.
pub trait ProviderAdapter: Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Default endpoint and models; config overrides are applied on top.
    fn info(&self) -> ProviderInfo;

    fn transport(&self) -> Transport {
        Transport::Rest
    }

    fn build_request(&self, request: &CallRequest) -> Result<ProviderRequest>;

    fn auth_headers(&self, credential: &str) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", credential),
        )]
    }

    /// Optional headers read from the session store; absent keys are skipped.
    fn extra_headers(&self, _store: &dyn KeyValueStore) -> Vec<(String, String)> {
        Vec::new()
    }

    fn parse_usage(&self, body: &Value) -> Usage {
        extract_usage(body)
    }

    fn parse_content(&self, body: &Value) -> Option<String> {
        chat_content(body)
    }
}

/// `choices[0].message.content`, falling back to `choices[0].text`.
pub fn chat_content(body: &Value) -> Option<String> {
    let choice = body.get("choices")?.get(0)?;
    choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .or_else(|| choice.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

struct Registered {
    adapter: Arc<dyn ProviderAdapter>,
    info: ProviderInfo,
}

/// Lookup table of adapters keyed by provider id.
///
/// Registration order is significant: default provider selection picks
/// the first registered provider that has a credential.
#[derive(Default)]
pub struct ProviderRegistry {
    entries: Vec<Registered>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in provider.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for preset in presets::all_presets() {
            registry.register(Arc::new(OpenAiCompatible::from_preset(preset)));
        }
        registry.register(Arc::new(AnthropicAdapter::new()));
        registry.register(Arc::new(TextGenAdapter::new()));
        registry
    }

    /// Register an adapter, replacing any adapter with the same id.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let info = adapter.info();
        match self.entries.iter_mut().find(|e| e.info.id == info.id) {
            Some(existing) => {
                existing.adapter = adapter;
                existing.info = info;
            }
            None => self.entries.push(Registered { adapter, info }),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &HashMap<String, ProviderOverride>) {
        for (id, ov) in overrides {
            let Some(entry) = self.entries.iter_mut().find(|e| &e.info.id == id) else {
                warn!(provider = %id, "Override for unregistered provider ignored");
                continue;
            };
            if let Some(url) = &ov.base_url {
                entry.info.base_url = url.clone();
            }
            if !ov.models.is_empty() {
                entry.info.models = ov.models.clone();
            }
        }
    }

    pub fn adapter(&self, id: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.entries
            .iter()
            .find(|e| e.info.id == id)
            .map(|e| e.adapter.clone())
            .ok_or_else(|| SemgraphError::UnknownProvider(id.to_string()))
    }

    pub fn info(&self, id: &str) -> Option<&ProviderInfo> {
        self.entries.iter().find(|e| e.info.id == id).map(|e| &e.info)
    }

    /// Providers in registration order.
    pub fn providers(&self) -> impl Iterator<Item = &ProviderInfo> {
        self.entries.iter().map(|e| &e.info)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_registered_in_order() {
        let registry = ProviderRegistry::with_defaults();
        let ids: Vec<&str> = registry.providers().map(|p| p.id.as_str()).collect();
        assert_eq!(ids[0], "openai");
        assert!(ids.contains(&"openrouter"));
        assert!(ids.contains(&"anthropic"));
        assert_eq!(*ids.last().unwrap(), "textgen");
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::with_defaults();
        assert!(matches!(
            registry.adapter("nope"),
            Err(SemgraphError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let mut registry = ProviderRegistry::with_defaults();
        let mut overrides = HashMap::new();
        overrides.insert(
            "groq".to_string(),
            ProviderOverride {
                base_url: Some("http://localhost:9999".into()),
                models: vec!["custom-model".into()],
            },
        );
        registry.apply_overrides(&overrides);
        let info = registry.info("groq").unwrap();
        assert_eq!(info.base_url, "http://localhost:9999");
        assert_eq!(info.models, vec!["custom-model"]);
    }

    #[test]
    fn test_chat_content_shapes() {
        let chat = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(chat_content(&chat).as_deref(), Some("hi"));
        let completion = json!({"choices": [{"text": "yo"}]});
        assert_eq!(chat_content(&completion).as_deref(), Some("yo"));
        assert!(chat_content(&json!({"choices": []})).is_none());
    }
}
