use serde_json::Value;

use super::sse_parser::DEFAULT_EVENT_NAME;
use crate::json::{json_event_name, parse_json};

/// Framing style detected for one chunk of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFormat {
    /// Carries `data:` or `event:` field prefixes
    Sse,
    /// Anything else; treated as newline-delimited JSON
    JsonLines,
}

impl ChunkFormat {
    /// Heuristic, chosen per chunk rather than pinned per stream.
    pub fn classify(chunk: &str) -> Self {
        if chunk.contains("data:") || chunk.contains("event:") {
            ChunkFormat::Sse
        } else {
            ChunkFormat::JsonLines
        }
    }
}

/// One non-blank line of a JSON-lines chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonLine {
    pub raw: String,
    pub parsed: Option<Value>,
}

impl JsonLine {
    /// `type`/`event` of a decoded object, else the default event name.
    pub fn event_name(&self) -> &str {
        self.parsed
            .as_ref()
            .and_then(json_event_name)
            .unwrap_or(DEFAULT_EVENT_NAME)
    }
}

/// Split on `\r?\n`, drop blank lines, decode each remaining line on its own.
pub fn split_json_lines(text: &str) -> Vec<JsonLine> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(|line| JsonLine {
            raw: line.to_string(),
            parsed: parse_json(line),
        })
        .collect()
}

/// JSON-lines splitter. Text after the last newline is emitted at once when it is already a
/// complete JSON object or array, and held back until its newline arrives otherwise.
#[derive(Debug, Default)]
pub struct JsonLinesBuffer {
    tail: String,
}

impl JsonLinesBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines of `tail + chunk`. Only an undecodable trailing fragment is carried.
    pub fn push(&mut self, chunk: &str) -> Vec<JsonLine> {
        self.tail.push_str(chunk);
        let mut lines = match self.tail.rfind('\n') {
            Some(last_newline) => {
                let rest = self.tail.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.tail, rest);
                split_json_lines(&complete)
            }
            None => Vec::new(),
        };

        if let Some(parsed) = parse_json(&self.tail).filter(|v| v.is_object() || v.is_array()) {
            let raw = std::mem::take(&mut self.tail);
            let raw = raw.trim_end_matches('\r').to_string();
            lines.push(JsonLine {
                raw,
                parsed: Some(parsed),
            });
        }
        lines
    }

    /// Take the carried partial line without decoding it.
    pub fn take_tail(&mut self) -> String {
        std::mem::take(&mut self.tail)
    }

    pub fn has_tail(&self) -> bool {
        !self.tail.is_empty()
    }

    /// End of stream: the carried line is decoded as a final line.
    pub fn finish(&mut self) -> Vec<JsonLine> {
        let tail = self.take_tail();
        split_json_lines(&tail)
    }
}
