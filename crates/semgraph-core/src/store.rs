use std::collections::HashMap;
use std::sync::RwLock;

/// Session-scoped key/value store for credentials and provider selection.
///
/// The engine and gateway only ever read from it; writes come from the
/// hosting application (settings dialogs, CLI flags, config seeding).
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    /// `get` that treats empty and whitespace-only values as missing.
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }
}

/// Well-known store keys.
pub mod keys {
    pub const ACTIVE_PROVIDER: &str = "active_provider";

    pub fn api_key(provider: &str) -> String {
        format!("api_key:{}", provider)
    }

    pub fn model(provider: &str) -> String {
        format!("model:{}", provider)
    }

    /// Optional per-provider request header, e.g. `header:openrouter:X-Title`.
    pub fn header(provider: &str, name: &str) -> String {
        format!("header:{}:{}", provider, name)
    }
}

/// In-memory store; contents live as long as the process (the "session").
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry, as when the hosting session ends.
    pub fn clear(&self) {
        if let Ok(mut map) = self.entries.write() {
            map.clear();
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.entries.write() {
            map.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.entries.write() {
            map.remove(key);
        }
    }
}
