use tracing::debug;

use semgraph_core::types::Usage;

use crate::usage::extract_usage;

/// Parse a raw SSE byte stream into individual events.
/// SSE format: `event: <type>\ndata: <payload>\n\n`
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    /// A chunk ended on `\r`; it may be the first half of `\r\n`.
    pending_cr: bool,
}

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event_type: Option<String>,
    pub data: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text into the parser and extract complete events.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        let mut text = String::with_capacity(chunk.len() + 1);
        if std::mem::take(&mut self.pending_cr) {
            text.push('\r');
        }
        text.push_str(chunk);
        if text.ends_with('\r') {
            text.pop();
            self.pending_cr = true;
        }
        if text.contains('\r') {
            text = text.replace("\r\n", "\n").replace('\r', "\n");
        }
        self.buffer.push_str(&text);
        let mut events = Vec::new();

        // Split on double newlines (event boundaries)
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&block[..pos]) {
                events.push(event);
            }
        }

        events
    }

    /// Flush a trailing event that was not terminated by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.pending_cr = false;
        let rest = std::mem::take(&mut self.buffer);
        parse_block(rest.trim_end_matches('\n'))
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event_type = None;
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if let Some(val) = line.strip_prefix("event:") {
            event_type = Some(val.trim().to_string());
        } else if let Some(val) = line.strip_prefix("data:") {
            // a single leading space is part of the framing
            data_lines.push(val.strip_prefix(' ').unwrap_or(val).to_string());
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event_type,
        data: data_lines.join("\n"),
    })
}

/// Incremental UTF-8 decoding across chunk boundaries.
#[derive(Default)]
struct Utf8Buffer {
    pending: Vec<u8>,
}

impl Utf8Buffer {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let (valid, invalid_len) = match std::str::from_utf8(&self.pending) {
            Ok(_) => (self.pending.len(), None),
            Err(e) => (e.valid_up_to(), e.error_len()),
        };

        let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
        match invalid_len {
            // invalid sequence, not a split one: replace and move on
            Some(len) => {
                self.pending.drain(..valid + len);
                text + "\u{FFFD}" + &self.push(&[])
            }
            None => {
                self.pending.drain(..valid);
                text
            }
        }
    }
}

/// Accumulates a token-streamed reply into one string.
///
/// Recognized events: `token` (appended), `usage`, `error` (fails the
/// whole call), and `done`/`end` (ignored; the transport closing ends the
/// stream). Events without a type are treated as tokens.
#[derive(Default)]
pub struct TokenAccumulator {
    parser: SseParser,
    utf8: Utf8Buffer,
    content: String,
    usage: Usage,
    tokens: usize,
}

impl TokenAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes. Returns the server-reported message on an `error` event.
    pub fn feed(&mut self, bytes: &[u8]) -> std::result::Result<(), String> {
        let text = self.utf8.push(bytes);
        for event in self.parser.feed(&text) {
            self.apply(event)?;
        }
        Ok(())
    }

    /// Finish the stream and return the accumulated content and usage.
    pub fn finish(mut self) -> std::result::Result<(String, Usage), String> {
        if let Some(event) = self.parser.finish() {
            self.apply(event)?;
        }
        debug!(tokens = self.tokens, "Token stream complete");
        Ok((self.content, self.usage))
    }

    fn apply(&mut self, event: SseEvent) -> std::result::Result<(), String> {
        match event.event_type.as_deref().unwrap_or("token") {
            "token" => {
                self.content.push_str(&token_text(&event.data));
                self.tokens += 1;
            }
            "usage" => {
                if let Ok(json) = serde_json::from_str::<serde_json::Value>(&event.data) {
                    self.usage = extract_usage(&json);
                }
            }
            "error" => return Err(error_text(&event.data)),
            _ => {}
        }
        Ok(())
    }
}

/// A token payload may be a JSON string, an object with a text field, or raw text.
fn token_text(data: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Object(map)) => ["token", "text", "content"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_default(),
        _ => data.to_string(),
    }
}

fn error_text(data: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(json) => json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Err(_) => data.to_string(),
    }
}
