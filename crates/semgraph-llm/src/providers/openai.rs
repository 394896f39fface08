use serde::Serialize;

use semgraph_core::error::Result;
use semgraph_core::store::{keys, KeyValueStore};
use semgraph_core::types::{CallRequest, ChatMessage};

use super::presets::ProviderPreset;
use super::{ProviderAdapter, ProviderInfo, ProviderRequest};

/// OpenAI-compatible adapter. Works with OpenAI, OpenRouter, Groq, Mistral, etc.
pub struct OpenAiCompatible {
    preset: &'static ProviderPreset,
}

impl OpenAiCompatible {
    pub fn from_preset(preset: &'static ProviderPreset) -> Self {
        Self { preset }
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Serialize)]
pub(crate) struct OaiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

pub(crate) fn convert_messages(messages: &[ChatMessage]) -> Vec<OaiMessage<'_>> {
    messages
        .iter()
        .map(|m| OaiMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect()
}

impl ProviderAdapter for OpenAiCompatible {
    fn id(&self) -> &str {
        self.preset.id
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.preset.id.to_string(),
            name: self.preset.name.to_string(),
            base_url: self.preset.default_base_url.to_string(),
            models: self.preset.models.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn build_request(&self, request: &CallRequest) -> Result<ProviderRequest> {
        let params = &request.params;

        // Chat payload whenever messages are present; single prompt otherwise
        if !request.messages.is_empty() {
            let body = ChatRequest {
                model: &request.model,
                messages: convert_messages(&request.messages),
                temperature: params.temperature,
                max_tokens: params.max_tokens,
                top_p: params.top_p,
            };
            return Ok(ProviderRequest {
                path: "/chat/completions".to_string(),
                payload: serde_json::to_value(&body)?,
            });
        }

        let body = CompletionRequest {
            model: &request.model,
            prompt: request.prompt.as_deref().unwrap_or_default(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
        };
        Ok(ProviderRequest {
            path: "/completions".to_string(),
            payload: serde_json::to_value(&body)?,
        })
    }

    fn extra_headers(&self, store: &dyn KeyValueStore) -> Vec<(String, String)> {
        self.preset
            .optional_headers
            .iter()
            .filter_map(|name| {
                store
                    .get_non_empty(&keys::header(self.preset.id, name))
                    .map(|value| (name.to_string(), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::presets::get_preset;
    use semgraph_core::store::MemoryStore;
    use semgraph_core::types::SamplingParams;

    fn adapter(id: &str) -> OpenAiCompatible {
        OpenAiCompatible::from_preset(get_preset(id).unwrap())
    }

    #[test]
    fn test_chat_payload() {
        let request = CallRequest::chat(
            "openai",
            "gpt-4o-mini",
            "sk-x",
            vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
        );
        let req = adapter("openai").build_request(&request).unwrap();
        assert_eq!(req.path, "/chat/completions");
        assert_eq!(req.payload["model"], "gpt-4o-mini");
        assert_eq!(req.payload["messages"][0]["role"], "system");
        assert_eq!(req.payload["messages"][1]["content"], "hello");
        assert_eq!(req.payload["max_tokens"], 1000);
        assert_eq!(req.payload["top_p"], 1.0);
    }

    #[test]
    fn test_prompt_fallback_payload() {
        let mut request = CallRequest::chat("groq", "llama", "k", vec![]);
        request.prompt = Some("complete me".into());
        request.params = SamplingParams {
            temperature: 0.1,
            max_tokens: 5,
            top_p: 0.5,
        };
        let req = adapter("groq").build_request(&request).unwrap();
        assert_eq!(req.path, "/completions");
        assert_eq!(req.payload["prompt"], "complete me");
        assert_eq!(req.payload["max_tokens"], 5);
        assert!(req.payload.get("messages").is_none());
    }

    #[test]
    fn test_optional_headers_only_when_present() {
        let store = MemoryStore::new();
        let openrouter = adapter("openrouter");
        assert!(openrouter.extra_headers(&store).is_empty());

        store.set(&keys::header("openrouter", "X-Title"), "semgraph");
        let headers = openrouter.extra_headers(&store);
        assert_eq!(headers, vec![("X-Title".to_string(), "semgraph".to_string())]);
    }

    #[test]
    fn test_openai_org_and_project() {
        let store = MemoryStore::new();
        store.set(&keys::header("openai", "OpenAI-Organization"), "org-1");
        store.set(&keys::header("openai", "OpenAI-Project"), "proj-1");
        let headers = adapter("openai").extra_headers(&store);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "OpenAI-Organization");
    }

    #[test]
    fn test_bearer_auth() {
        let headers = adapter("mistral").auth_headers("key-1");
        assert_eq!(headers[0], ("Authorization".to_string(), "Bearer key-1".to_string()));
    }
}
