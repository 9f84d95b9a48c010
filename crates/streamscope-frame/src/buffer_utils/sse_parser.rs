use serde::Serialize;
use serde_json::Value;

use crate::json::parse_json;

/// Event name used when a frame carries no (or an empty) `event:` field.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// One complete server-sent-event frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SseFrame {
    /// Concatenated `data:` lines, newline-joined
    pub data: String,
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
    /// `data` decoded as JSON, when it is valid JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// At least one `data:` line was present. EventSource dispatches nothing without one.
    #[serde(skip)]
    pub has_data: bool,
}

/// Stateful SSE framer carrying the incomplete tail between chunks.
///
/// Each [`feed`](FrameParser::feed) appends the chunk to the carried buffer, emits every
/// frame terminated by a blank line and keeps the rest for the next call.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<SseFrame> {
        let carried = std::mem::take(&mut self.buffer);
        let (frames, leftover) = parse_frames(carried, chunk);
        self.buffer = leftover;
        frames
    }

    /// Text waiting for a blank-line terminator.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// End of stream: return the unterminated remainder. It is never emitted as a frame.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

/// Pure form of the framer: `(carried buffer, new chunk) -> (frames, new leftover)`.
pub fn parse_frames(mut buffer: String, chunk: &str) -> (Vec<SseFrame>, String) {
    buffer.push_str(chunk);

    let mut frames = Vec::new();
    let mut rest: &str = &buffer;
    while let Some((block_end, next_start)) = find_blank_line(rest) {
        if let Some(frame) = parse_block(&rest[..block_end]) {
            frames.push(frame);
        }
        rest = &rest[next_start..];
    }

    let leftover = rest.to_string();
    (frames, leftover)
}

/// Locate the first `\r?\n\r?\n` terminator.
///
/// Returns `(end of block, start of the text after the terminator)`.
fn find_blank_line(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = bytes[search_from..].iter().position(|&b| b == b'\n') {
        let nl = search_from + offset;
        let block_end = if nl > 0 && bytes[nl - 1] == b'\r' { nl - 1 } else { nl };

        match bytes.get(nl + 1) {
            Some(b'\n') => return Some((block_end, nl + 2)),
            Some(b'\r') if bytes.get(nl + 2) == Some(&b'\n') => {
                return Some((block_end, nl + 3))
            }
            _ => search_from = nl + 1,
        }
    }
    None
}

/// Turn one complete block into a frame. Blocks with no recognised field produce nothing.
fn parse_block(block: &str) -> Option<SseFrame> {
    if block.trim().is_empty() {
        return None;
    }

    let mut data = String::new();
    let mut event_name = DEFAULT_EVENT_NAME.to_string();
    let mut id = None;
    let mut retry = None;
    let mut saw_field = false;
    let mut has_data = false;

    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            data.push_str(value);
            data.push('\n');
            saw_field = true;
            has_data = true;
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.trim();
            event_name = if value.is_empty() {
                DEFAULT_EVENT_NAME.to_string()
            } else {
                value.to_string()
            };
            saw_field = true;
        } else if let Some(value) = line.strip_prefix("id:") {
            id = Some(value.trim().to_string());
            saw_field = true;
        } else if let Some(value) = line.strip_prefix("retry:") {
            if let Ok(ms) = value.trim().parse::<u64>() {
                retry = Some(ms);
                saw_field = true;
            }
        }
        // comments (":") and unknown fields are ignored
    }

    if !saw_field {
        return None;
    }

    if data.ends_with('\n') {
        data.pop();
    }
    let json = parse_json(&data);

    Some(SseFrame {
        data,
        event_name,
        id,
        retry,
        json,
        has_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_frame() {
        let mut parser = FrameParser::new();
        let frames = parser.feed("data: hello\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hello");
        assert_eq!(frames[0].event_name, "message");
        assert!(!parser.has_pending());
    }

    #[test]
    fn test_reassembly_across_chunks() {
        let mut parser = FrameParser::new();
        assert!(parser.feed("data: hel").is_empty());
        assert_eq!(parser.pending(), "data: hel");

        let frames = parser.feed("lo\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hello");

        let (one_shot, leftover) = parse_frames(String::new(), "data: hello\n\n");
        assert_eq!(frames, one_shot);
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_multiline_data() {
        let (frames, _) = parse_frames(String::new(), "data: a\ndata: b\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "a\nb");
    }

    #[test]
    fn test_fields() {
        let (frames, _) = parse_frames(
            String::new(),
            "event: delta\nid:  42 \nretry: 1500\ndata:{\"x\":1}\n\n",
        );
        let frame = &frames[0];
        assert_eq!(frame.event_name, "delta");
        assert_eq!(frame.id.as_deref(), Some("42"));
        assert_eq!(frame.retry, Some(1500));
        assert_eq!(frame.data, "{\"x\":1}");
        assert_eq!(frame.json, Some(json!({"x": 1})));
    }

    #[test]
    fn test_empty_event_name_falls_back_to_default() {
        let (frames, _) = parse_frames(String::new(), "event:\ndata: x\n\n");
        assert_eq!(frames[0].event_name, "message");
    }

    #[test]
    fn test_invalid_retry_is_ignored() {
        let (frames, _) = parse_frames(String::new(), "retry: soon\ndata: x\n\n");
        assert_eq!(frames[0].retry, None);
    }

    #[test]
    fn test_non_json_data_has_no_json() {
        let (frames, _) = parse_frames(String::new(), "data: not json\n\n");
        assert_eq!(frames[0].data, "not json");
        assert!(frames[0].json.is_none());
    }

    #[test]
    fn test_frame_without_data_still_emits() {
        let (frames, _) = parse_frames(String::new(), "event: ping\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "");
        assert_eq!(frames[0].event_name, "ping");
    }

    #[test]
    fn test_stray_blank_lines_and_comments_emit_nothing() {
        let (frames, leftover) = parse_frames(String::new(), "\n\n: keep-alive\n\n\n\n");
        assert!(frames.is_empty());
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_crlf_terminators() {
        let (frames, leftover) =
            parse_frames(String::new(), "data: a\r\ndata: b\r\n\r\ndata: c\r\n\ndata: d");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "a\nb");
        assert_eq!(frames[1].data, "c");
        assert_eq!(leftover, "data: d");
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let (frames, _) = parse_frames(String::new(), "data:   indented\n\n");
        assert_eq!(frames[0].data, "  indented");
    }

    #[test]
    fn test_finish_returns_unterminated_tail() {
        let mut parser = FrameParser::new();
        parser.feed("data: one\n\ndata: tw");
        assert_eq!(parser.finish(), "data: tw");
        assert!(!parser.has_pending());
    }

    #[test]
    fn test_has_data_marks_dispatchable_frames() {
        let (frames, _) = parse_frames(
            String::new(),
            "retry: 3000\n\nid: 7\n\nevent: ping\ndata:\n\n",
        );
        assert_eq!(frames.len(), 3);
        assert!(!frames[0].has_data);
        assert!(!frames[1].has_data);
        assert!(frames[2].has_data);
        assert_eq!(frames[2].data, "");
    }
}
