use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemgraphError};
use crate::store::{keys, KeyValueStore};
use crate::types::SamplingParams;

/// Top-level semgraph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sampling defaults for every model call.
    #[serde(default)]
    pub sampling: SamplingParams,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Per-provider overrides keyed by provider id.
    #[serde(default)]
    pub providers: HashMap<String, ProviderOverride>,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Path to a TOML prompt library replacing the built-in templates.
    #[serde(default)]
    pub prompts: Option<String>,
    /// Path to a JSON ontology catalog replacing the built-in one.
    #[serde(default)]
    pub catalog: Option<String>,
}

/// How the engine orders nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOrder {
    /// Node-array order; edges are not consulted.
    #[default]
    Declaration,
    /// Kahn's algorithm over the edge set; cycles are an error.
    Topological,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub order: ExecutionOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Number of provider calls kept in the history ring. Default: 50
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// HTTP client timeout. None = no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            timeout_secs: None,
        }
    }
}

fn default_history_capacity() -> usize { 50 }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderOverride {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Replaces the provider's model list; the first entry becomes the default.
    #[serde(default)]
    pub models: Vec<String>,
}

/// Credentials seeded into the session store at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub active_provider: Option<String>,
    /// `provider id = "api key"` pairs.
    #[serde(flatten)]
    pub keys: HashMap<String, String>,
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| SemgraphError::ConfigNotFound(path.display().to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        toml::from_str(&expanded).map_err(|e| SemgraphError::Config(e.to_string()))
    }

    /// Default config location: `$HOME/.semgraph/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs_home().map(|h| h.join(".semgraph").join("config.toml"))
    }

    /// Copy configured credentials into a session store.
    pub fn seed_store(&self, store: &dyn KeyValueStore) {
        for (provider, key) in &self.credentials.keys {
            if !key.trim().is_empty() {
                store.set(&keys::api_key(provider), key);
            }
        }
        if let Some(active) = &self.credentials.active_provider {
            store.set(keys::ACTIVE_PROVIDER, active);
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
