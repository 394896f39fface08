use thiserror::Error;

/// Rate-limit and tracing metadata lifted from a provider's response headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    pub request_id: Option<String>,
    pub retry_after: Option<String>,
    pub rate_limit_remaining: Option<String>,
    pub rate_limit_reset: Option<String>,
}

impl ResponseMeta {
    pub fn is_empty(&self) -> bool {
        self.request_id.is_none()
            && self.retry_after.is_none()
            && self.rate_limit_remaining.is_none()
            && self.rate_limit_reset.is_none()
    }
}

impl std::fmt::Display for ResponseMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = &self.request_id {
            parts.push(format!("request_id={}", id));
        }
        if let Some(ra) = &self.retry_after {
            parts.push(format!("retry_after={}", ra));
        }
        if let Some(rem) = &self.rate_limit_remaining {
            parts.push(format!("remaining={}", rem));
        }
        if let Some(reset) = &self.rate_limit_reset {
            parts.push(format!("reset={}", reset));
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[derive(Debug, Error)]
pub enum SemgraphError {
    // Precondition errors
    #[error("Workflow has no nodes to execute")]
    WorkflowEmpty,

    #[error("No provider configured: store an API key for at least one provider")]
    NoProviderConfigured,

    // Ordering errors
    #[error("Dependency cycle detected among nodes: {}", remaining.join(", "))]
    CycleDetected { remaining: Vec<String> },

    // Provider errors
    #[error("{provider} API error ({status}): {message}")]
    ProviderHttp {
        provider: String,
        status: u16,
        message: String,
        meta: ResponseMeta,
    },

    #[error("{provider} request failed: {message}")]
    ProviderTransport { provider: String, message: String },

    #[error("{provider} stream failed: {message}")]
    ProviderStream { provider: String, message: String },

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider response parse error: {0}")]
    ResponseParse(String),

    // Codec errors
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Prompt template error: {0}")]
    Template(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SemgraphError {
    /// Whether this error is raised before a run touches any state.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::WorkflowEmpty | Self::NoProviderConfigured)
    }

    /// HTTP status carried by a provider error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ProviderHttp { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SemgraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_http_display() {
        let err = SemgraphError::ProviderHttp {
            provider: "openai".into(),
            status: 429,
            message: "Rate limit reached".into(),
            meta: ResponseMeta {
                request_id: Some("req_1".into()),
                ..Default::default()
            },
        };
        assert_eq!(err.to_string(), "openai API error (429): Rate limit reached");
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_cycle_display_lists_nodes() {
        let err = SemgraphError::CycleDetected {
            remaining: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().ends_with("a, b"));
    }

    #[test]
    fn test_precondition_classification() {
        assert!(SemgraphError::WorkflowEmpty.is_precondition());
        assert!(SemgraphError::NoProviderConfigured.is_precondition());
        assert!(!SemgraphError::UnsupportedFormat("pdf".into()).is_precondition());
    }

    #[test]
    fn test_meta_display() {
        let meta = ResponseMeta {
            request_id: Some("abc".into()),
            retry_after: Some("20".into()),
            rate_limit_remaining: None,
            rate_limit_reset: None,
        };
        assert_eq!(meta.to_string(), "request_id=abc retry_after=20");
        assert!(ResponseMeta::default().is_empty());
    }
}
