use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::BoxFuture;
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use semgraph_core::config::AppConfig;
use semgraph_core::error::{ResponseMeta, Result, SemgraphError};
use semgraph_core::store::KeyValueStore;
use semgraph_core::traits::ModelClient;
use semgraph_core::types::{CallRequest, CallResponse, ChatMessage, SamplingParams, Usage};

use crate::history::{mask_headers, CallHistory, CallRecord};
use crate::providers::{ProviderAdapter, ProviderRegistry, Transport};
use crate::selection::{resolve_selection, Selection};
use crate::streaming::TokenAccumulator;

/// Uniform call contract over every registered provider.
pub struct ProviderGateway {
    http: Client,
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn KeyValueStore>,
    history: CallHistory,
    sampling: SamplingParams,
}

struct Attempt {
    status: Option<u16>,
    result: Result<(String, Usage)>,
}

impl ProviderGateway {
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            http: Client::new(),
            registry,
            store,
            history: CallHistory::default(),
            sampling: SamplingParams::default(),
        }
    }

    /// Built-in providers with config overrides, timeout and history size applied.
    pub fn from_config(config: &AppConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut registry = ProviderRegistry::with_defaults();
        registry.apply_overrides(&config.providers);

        let mut builder = Client::builder();
        if let Some(secs) = config.gateway.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| SemgraphError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            registry: Arc::new(registry),
            store,
            history: CallHistory::new(config.gateway.history_capacity),
            sampling: config.sampling.clone(),
        })
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Provider, model and credential the next call would use.
    pub fn selection(&self) -> Result<Selection> {
        resolve_selection(&self.registry, self.store.as_ref())
    }

    /// Chat call with the gateway's default sampling parameters.
    pub async fn chat(
        &self,
        provider: &str,
        model: &str,
        credential: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<CallResponse> {
        let request = CallRequest::chat(provider, model, credential, messages)
            .with_params(self.sampling.clone());
        self.send(request).await
    }

    pub async fn send(&self, request: CallRequest) -> Result<CallResponse> {
        let adapter = self.registry.adapter(&request.provider)?;
        let base_url = self
            .registry
            .info(&request.provider)
            .map(|info| info.base_url.clone())
            .unwrap_or_else(|| adapter.info().base_url);

        let built = adapter.build_request(&request)?;
        let url = format!("{}{}", base_url.trim_end_matches('/'), built.path);

        let mut headers = adapter.auth_headers(&request.credential);
        headers.extend(adapter.extra_headers(self.store.as_ref()));
        headers.push(("Content-Type".to_string(), "application/json".to_string()));

        let body = serde_json::to_vec(&built.payload)?;

        debug!(provider = %request.provider, model = %request.model, %url, "Provider call");
        let start = Instant::now();
        let attempt = match adapter.transport() {
            Transport::Rest => {
                self.send_rest(adapter.as_ref(), &request.provider, &url, &headers, body)
                    .await
            }
            Transport::TokenStream => {
                self.send_stream(&request.provider, &url, &headers, body)
                    .await
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let usage = attempt.result.as_ref().map(|(_, u)| *u).unwrap_or_default();
        self.history.record(CallRecord {
            provider: request.provider.clone(),
            method: "POST".to_string(),
            url,
            status: attempt.status,
            elapsed_ms,
            input_tokens: usage.input,
            output_tokens: usage.output,
            headers: mask_headers(&headers),
            timestamp: Utc::now(),
        });

        match attempt.result {
            Ok((content, usage)) => {
                debug!(
                    provider = %request.provider,
                    elapsed_ms,
                    input_tokens = usage.input,
                    output_tokens = usage.output,
                    "Provider call complete"
                );
                Ok(CallResponse {
                    content,
                    usage,
                    provider: request.provider,
                    model: request.model,
                })
            }
            Err(e) => {
                warn!(provider = %request.provider, elapsed_ms, error = %e, "Provider call failed");
                Err(e)
            }
        }
    }

    /// Newest first.
    pub fn history(&self) -> Vec<CallRecord> {
        self.history.snapshot()
    }

    pub fn clear_history(&self) {
        self.history.clear();
    }

    async fn post(
        &self,
        provider: &str,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> std::result::Result<reqwest::Response, Attempt> {
        let mut req = self.http.post(url).body(body);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.send().await.map_err(|e| Attempt {
            status: None,
            result: Err(SemgraphError::ProviderTransport {
                provider: provider.to_string(),
                message: e.to_string(),
            }),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let meta = response_meta(response.headers());
        let text = response.text().await.unwrap_or_default();
        Err(Attempt {
            status: Some(status.as_u16()),
            result: Err(SemgraphError::ProviderHttp {
                provider: provider.to_string(),
                status: status.as_u16(),
                message: error_message(&text, status),
                meta,
            }),
        })
    }

    async fn send_rest(
        &self,
        adapter: &dyn ProviderAdapter,
        provider: &str,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Attempt {
        let response = match self.post(provider, url, headers, body).await {
            Ok(response) => response,
            Err(attempt) => return attempt,
        };
        let status = Some(response.status().as_u16());
        let result = read_rest(adapter, provider, response).await;
        Attempt { status, result }
    }

    async fn send_stream(
        &self,
        provider: &str,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
    ) -> Attempt {
        let response = match self.post(provider, url, headers, body).await {
            Ok(response) => response,
            Err(attempt) => return attempt,
        };
        let status = Some(response.status().as_u16());

        let stream_error = |message: String| SemgraphError::ProviderStream {
            provider: provider.to_string(),
            message,
        };

        let mut accumulator = TokenAccumulator::new();
        let mut chunks = std::pin::pin!(response.bytes_stream());
        while let Some(chunk) = chunks.next().await {
            let fed = match chunk {
                Ok(bytes) => accumulator.feed(&bytes),
                Err(e) => Err(e.to_string()),
            };
            if let Err(message) = fed {
                // Partial output is discarded; the call fails as a whole
                return Attempt {
                    status,
                    result: Err(stream_error(message)),
                };
            }
        }

        Attempt {
            status,
            result: accumulator.finish().map_err(stream_error),
        }
    }
}

async fn read_rest(
    adapter: &dyn ProviderAdapter,
    provider: &str,
    response: reqwest::Response,
) -> Result<(String, Usage)> {
    let text = response
        .text()
        .await
        .map_err(|e| SemgraphError::ProviderTransport {
            provider: provider.to_string(),
            message: e.to_string(),
        })?;
    let json: Value = serde_json::from_str(&text)
        .map_err(|e| SemgraphError::ResponseParse(format!("{}: {}", provider, e)))?;
    let content = adapter.parse_content(&json).ok_or_else(|| {
        SemgraphError::ResponseParse(format!("{}: response has no content", provider))
    })?;
    Ok((content, adapter.parse_usage(&json)))
}

impl ModelClient for ProviderGateway {
    fn call(&self, request: CallRequest) -> BoxFuture<'_, Result<CallResponse>> {
        Box::pin(self.send(request))
    }
}

fn header_value(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// Request id and rate-limit hints from a failed response.
pub fn response_meta(headers: &HeaderMap) -> ResponseMeta {
    ResponseMeta {
        request_id: header_value(headers, &["x-request-id", "request-id"]),
        retry_after: header_value(headers, &["retry-after"]),
        rate_limit_remaining: header_value(headers, &["x-ratelimit-remaining-requests"]),
        rate_limit_reset: header_value(headers, &["x-ratelimit-reset-requests"]),
    }
}

/// Best human-readable message in an error body.
pub fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let found = json
            .get("error")
            .and_then(|e| e.get("message"))
            .or_else(|| json.get("message"))
            .or_else(|| json.get("error"))
            .and_then(Value::as_str);
        if let Some(message) = found {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        trimmed.to_string()
    }
}
