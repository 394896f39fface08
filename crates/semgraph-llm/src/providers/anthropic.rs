use serde::Serialize;
use serde_json::Value;

use semgraph_core::error::Result;
use semgraph_core::types::{CallRequest, Role};

use super::{ProviderAdapter, ProviderInfo, ProviderRequest};

const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter.
pub struct AnthropicAdapter;

impl AnthropicAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "anthropic".to_string(),
            name: "Anthropic".to_string(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            models: vec![
                "claude-3-5-haiku-latest".to_string(),
                "claude-3-5-sonnet-latest".to_string(),
            ],
        }
    }

    fn build_request(&self, request: &CallRequest) -> Result<ProviderRequest> {
        // System messages travel in a top-level field
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let mut messages: Vec<AnthropicMessage> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        if messages.is_empty() {
            messages.push(AnthropicMessage {
                role: "user",
                content: request.prompt.as_deref().unwrap_or_default(),
            });
        }

        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.params.max_tokens,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages,
            temperature: request.params.temperature,
            top_p: request.params.top_p,
        };

        Ok(ProviderRequest {
            path: "/messages".to_string(),
            payload: serde_json::to_value(&body)?,
        })
    }

    fn auth_headers(&self, credential: &str) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), credential.to_string()),
            ("anthropic-version".to_string(), API_VERSION.to_string()),
        ]
    }

    /// Concatenated text blocks of `content`.
    fn parse_content(&self, body: &Value) -> Option<String> {
        let blocks = body.get("content")?.as_array()?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str).unwrap_or("text") == "text")
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semgraph_core::types::{ChatMessage, Usage};
    use serde_json::json;

    #[test]
    fn test_system_split_out() {
        let request = CallRequest::chat(
            "anthropic",
            "claude-3-5-haiku-latest",
            "key",
            vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
        );
        let req = AnthropicAdapter::new().build_request(&request).unwrap();
        assert_eq!(req.path, "/messages");
        assert_eq!(req.payload["system"], "be brief");
        assert_eq!(req.payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(req.payload["messages"][0]["role"], "user");
        assert_eq!(req.payload["max_tokens"], 1000);
    }

    #[test]
    fn test_prompt_only_becomes_user_message() {
        let mut request = CallRequest::chat("anthropic", "m", "key", vec![]);
        request.prompt = Some("write".into());
        let req = AnthropicAdapter::new().build_request(&request).unwrap();
        assert!(req.payload.get("system").is_none());
        assert_eq!(req.payload["messages"][0]["content"], "write");
    }

    #[test]
    fn test_auth_headers() {
        let headers = AnthropicAdapter::new().auth_headers("ant-key");
        assert_eq!(headers[0], ("x-api-key".to_string(), "ant-key".to_string()));
        assert_eq!(headers[1].0, "anthropic-version");
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "text", "text": " there"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 4}
        });
        let adapter = AnthropicAdapter::new();
        assert_eq!(adapter.parse_content(&body).as_deref(), Some("Hello there"));
        assert_eq!(adapter.parse_usage(&body), Usage::new(12, 4));
    }
}
