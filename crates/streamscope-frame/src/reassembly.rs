use serde_json::Value;

use crate::buffer_utils::{
    split_json_lines, ChunkFormat, FrameParser, JsonLine, JsonLinesBuffer, SseFrame,
    Utf8StreamDecoder,
};

/// A message recovered from a byte stream, whichever framing produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub raw_text: String,
    pub event_name: String,
    pub event_id: Option<String>,
    pub retry: Option<u64>,
    pub json: Option<Value>,
}

impl From<SseFrame> for DecodedMessage {
    fn from(frame: SseFrame) -> Self {
        Self {
            raw_text: frame.data,
            event_name: frame.event_name,
            event_id: frame.id,
            retry: frame.retry,
            json: frame.json,
        }
    }
}

impl From<JsonLine> for DecodedMessage {
    fn from(line: JsonLine) -> Self {
        let event_name = line.event_name().to_string();
        Self {
            raw_text: line.raw,
            event_name,
            event_id: None,
            retry: None,
            json: line.parsed,
        }
    }
}

/// Per-stream decode state: incremental UTF-8 decoding, SSE framing and JSON-lines splitting.
///
/// The framing style is picked per chunk. A chunk goes to the SSE framer when it carries
/// `data:`/`event:` prefixes or when an SSE frame is still waiting for its terminator;
/// otherwise it is read as JSON lines, one message per non-blank line. A trailing line that
/// already decodes as a JSON object or array is emitted with its chunk; only an undecodable
/// fragment is carried into the next chunk, and it is flushed as a line of its own when that
/// chunk switches to SSE framing.
#[derive(Default)]
pub struct StreamReassembler {
    decoder: Utf8StreamDecoder,
    frames: FrameParser,
    lines: JsonLinesBuffer,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<DecodedMessage> {
        let text = self.decoder.decode(bytes);
        self.push_text(&text)
    }

    pub fn push_text(&mut self, text: &str) -> Vec<DecodedMessage> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunk = self.lines.take_tail();
        let carried = !chunk.is_empty();
        chunk.push_str(text);

        if !self.frames.has_pending() && ChunkFormat::classify(&chunk) == ChunkFormat::JsonLines {
            return self
                .lines
                .push(&chunk)
                .into_iter()
                .map(DecodedMessage::from)
                .collect();
        }

        let mut messages = Vec::new();
        let mut sse = chunk.as_str();
        // a carried partial line ends at the first newline, unless it was the start of a field
        if carried {
            if let Some((first, rest)) = chunk.split_once('\n') {
                if !is_field_line(first) {
                    messages.extend(split_json_lines(first).into_iter().map(DecodedMessage::from));
                    sse = rest;
                }
            }
        }
        messages.extend(self.frames.feed(sse).into_iter().map(DecodedMessage::from));
        messages
    }

    /// End of stream. A carried JSON line is emitted; an unterminated SSE frame is dropped.
    pub fn finish(&mut self) -> Vec<DecodedMessage> {
        let tail = self.decoder.finish();
        let mut messages = if tail.is_empty() {
            Vec::new()
        } else {
            self.push_text(&tail)
        };

        let dropped = self.frames.finish();
        if !dropped.is_empty() {
            tracing::debug!(bytes = dropped.len(), "dropping unterminated SSE frame");
        }

        messages.extend(self.lines.finish().into_iter().map(DecodedMessage::from));
        messages
    }
}

fn is_field_line(line: &str) -> bool {
    ["data:", "event:", "id:", "retry:", ":"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}
