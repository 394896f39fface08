use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

const VISIBLE_SECRET_CHARS: usize = 6;

/// One provider call as seen on the wire. Headers are masked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub provider: String,
    pub method: String,
    pub url: String,
    /// None when the request never produced a response.
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub headers: Vec<(String, String)>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded, newest-first log of provider calls.
pub struct CallHistory {
    capacity: usize,
    entries: Mutex<VecDeque<CallRecord>>,
}

impl CallHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, record: CallRecord) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push_front(record);
            entries.truncate(self.capacity);
        }
    }

    /// Newest first.
    pub fn snapshot(&self) -> Vec<CallRecord> {
        self.entries
            .lock()
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for CallHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Keep only the last six characters of a secret. Secrets that short are hidden entirely.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= VISIBLE_SECRET_CHARS {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - VISIBLE_SECRET_CHARS..].iter().collect();
    format!("***{}", tail)
}

fn is_secret_header(name: &str) -> bool {
    ["authorization", "x-api-key", "api-key"]
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

/// Copy of `headers` safe to log or display.
pub fn mask_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            if !is_secret_header(name) {
                return (name.clone(), value.clone());
            }
            let masked = match value.strip_prefix("Bearer ") {
                Some(token) => format!("Bearer {}", mask_secret(token)),
                None => mask_secret(value),
            };
            (name.clone(), masked)
        })
        .collect()
}
