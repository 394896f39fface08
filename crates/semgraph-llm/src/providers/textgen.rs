use serde::Serialize;

use semgraph_core::error::Result;
use semgraph_core::types::CallRequest;

use super::openai::{convert_messages, OaiMessage};
use super::{ProviderAdapter, ProviderInfo, ProviderRequest, Transport};

/// Self-hosted text-generation server that replies with an event stream
/// of `token` events rather than one JSON body.
pub struct TextGenAdapter;

impl TextGenAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextGenAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct StreamRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    messages: Vec<OaiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inputs: Option<&'a str>,
    parameters: Parameters,
    stream: bool,
}

#[derive(Serialize)]
struct Parameters {
    temperature: f32,
    max_new_tokens: u32,
    top_p: f32,
}

impl ProviderAdapter for TextGenAdapter {
    fn id(&self) -> &str {
        "textgen"
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "textgen".to_string(),
            name: "Text Generation Server".to_string(),
            base_url: "http://localhost:8080".to_string(),
            models: vec!["default".to_string()],
        }
    }

    fn transport(&self) -> Transport {
        Transport::TokenStream
    }

    fn build_request(&self, request: &CallRequest) -> Result<ProviderRequest> {
        let body = StreamRequest {
            model: &request.model,
            messages: convert_messages(&request.messages),
            inputs: if request.messages.is_empty() {
                Some(request.prompt.as_deref().unwrap_or_default())
            } else {
                None
            },
            parameters: Parameters {
                temperature: request.params.temperature,
                max_new_tokens: request.params.max_tokens,
                top_p: request.params.top_p,
            },
            stream: true,
        };
        Ok(ProviderRequest {
            path: "/generate_stream".to_string(),
            payload: serde_json::to_value(&body)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semgraph_core::types::ChatMessage;

    #[test]
    fn test_stream_payload() {
        let request = CallRequest::chat("textgen", "default", "k", vec![ChatMessage::user("hi")]);
        let adapter = TextGenAdapter::new();
        assert_eq!(adapter.transport(), Transport::TokenStream);

        let req = adapter.build_request(&request).unwrap();
        assert_eq!(req.path, "/generate_stream");
        assert_eq!(req.payload["stream"], true);
        assert_eq!(req.payload["parameters"]["max_new_tokens"], 1000);
        assert!(req.payload.get("inputs").is_none());
    }

    #[test]
    fn test_prompt_payload() {
        let mut request = CallRequest::chat("textgen", "default", "k", vec![]);
        request.prompt = Some("once upon".into());
        let req = TextGenAdapter::new().build_request(&request).unwrap();
        assert_eq!(req.payload["inputs"], "once upon");
        assert!(req.payload.get("messages").is_none());
    }
}
