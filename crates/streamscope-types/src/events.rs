use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::stream_id::StreamId;

/// Discriminant of a [`StreamEvent`], as it appears in the `kind` field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Init,
    Open,
    Message,
    Error,
    Close,
    StreamOpen,
    StreamClose,
    Warn,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Open => "open",
            EventKind::Message => "message",
            EventKind::Error => "error",
            EventKind::Close => "close",
            EventKind::StreamOpen => "stream-open",
            EventKind::StreamClose => "stream-close",
            EventKind::Warn => "warn",
        }
    }

    /// Diagnostic kinds bypass the noise filter.
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, EventKind::Init | EventKind::Warn)
    }

    pub fn opens_connection(&self) -> bool {
        matches!(self, EventKind::Open | EventKind::StreamOpen)
    }

    pub fn closes_connection(&self) -> bool {
        matches!(self, EventKind::Close | EventKind::StreamClose)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stream lifecycle was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamSubtype {
    /// Low-level body reader (`getReader()` path)
    Reader,
    /// Incrementally polled XMLHttpRequest
    XhrStream,
    /// `response.text()` convenience method
    FetchText,
    /// `response.json()` convenience method
    FetchJson,
}

impl StreamSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamSubtype::Reader => "reader",
            StreamSubtype::XhrStream => "xhr-stream",
            StreamSubtype::FetchText => "fetch-text",
            StreamSubtype::FetchJson => "fetch-json",
        }
    }
}

/// One reconstructed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub raw_text: String,
    pub event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
}

impl MessagePayload {
    pub fn new(raw_text: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            event_name: event_name.into(),
            event_id: None,
            retry: None,
            parsed_json: None,
            stream_id: None,
        }
    }

    pub fn with_event_id(mut self, id: Option<String>) -> Self {
        self.event_id = id;
        self
    }

    pub fn with_retry(mut self, retry: Option<u64>) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_parsed_json(mut self, json: Option<Value>) -> Self {
        self.parsed_json = json;
        self
    }

    pub fn with_stream_id(mut self, stream_id: Option<StreamId>) -> Self {
        self.stream_id = stream_id;
        self
    }
}

/// EventSource connection opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<String>,
    pub ready_state: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_state: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
}

/// Start or end of a reader / XHR / fetch-body stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamLifecyclePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
    pub subtype: StreamSubtype,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl StreamLifecyclePayload {
    pub fn new(subtype: StreamSubtype, stream_id: Option<StreamId>) -> Self {
        Self {
            stream_id,
            subtype,
            method: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

/// Free-form diagnostic text carried by `init` and `warn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticePayload {
    pub message: String,
}

/// Kind-specific payload of a [`StreamEvent`]. The variant *is* the kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    Init(NoticePayload),
    Open(OpenPayload),
    Message(MessagePayload),
    Error(ErrorPayload),
    Close(ClosePayload),
    StreamOpen(StreamLifecyclePayload),
    StreamClose(StreamLifecyclePayload),
    Warn(NoticePayload),
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::Init(_) => EventKind::Init,
            EventBody::Open(_) => EventKind::Open,
            EventBody::Message(_) => EventKind::Message,
            EventBody::Error(_) => EventKind::Error,
            EventBody::Close(_) => EventKind::Close,
            EventBody::StreamOpen(_) => EventKind::StreamOpen,
            EventBody::StreamClose(_) => EventKind::StreamClose,
            EventBody::Warn(_) => EventKind::Warn,
        }
    }

    pub fn stream_id(&self) -> Option<&StreamId> {
        match self {
            EventBody::Open(p) => p.stream_id.as_ref(),
            EventBody::Message(p) => p.stream_id.as_ref(),
            EventBody::Error(p) => p.stream_id.as_ref(),
            EventBody::Close(p) => p.stream_id.as_ref(),
            EventBody::StreamOpen(p) | EventBody::StreamClose(p) => p.stream_id.as_ref(),
            EventBody::Init(_) | EventBody::Warn(_) => None,
        }
    }

    pub fn init(message: impl Into<String>) -> Self {
        EventBody::Init(NoticePayload {
            message: message.into(),
        })
    }

    pub fn warn(message: impl Into<String>) -> Self {
        EventBody::Warn(NoticePayload {
            message: message.into(),
        })
    }

    pub(crate) fn payload_value(&self) -> serde_json::Result<Value> {
        match self {
            EventBody::Init(p) | EventBody::Warn(p) => serde_json::to_value(p),
            EventBody::Open(p) => serde_json::to_value(p),
            EventBody::Message(p) => serde_json::to_value(p),
            EventBody::Error(p) => serde_json::to_value(p),
            EventBody::Close(p) => serde_json::to_value(p),
            EventBody::StreamOpen(p) | EventBody::StreamClose(p) => serde_json::to_value(p),
        }
    }

    pub(crate) fn from_payload(kind: EventKind, payload: Value) -> serde_json::Result<Self> {
        Ok(match kind {
            EventKind::Init => EventBody::Init(serde_json::from_value(payload)?),
            EventKind::Open => EventBody::Open(serde_json::from_value(payload)?),
            EventKind::Message => EventBody::Message(serde_json::from_value(payload)?),
            EventKind::Error => EventBody::Error(serde_json::from_value(payload)?),
            EventKind::Close => EventBody::Close(serde_json::from_value(payload)?),
            EventKind::StreamOpen => EventBody::StreamOpen(serde_json::from_value(payload)?),
            EventKind::StreamClose => EventBody::StreamClose(serde_json::from_value(payload)?),
            EventKind::Warn => EventBody::Warn(serde_json::from_value(payload)?),
        })
    }
}

/// The atomic unit emitted by the page side toward the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub source_url: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub body: EventBody,
}

impl StreamEvent {
    pub fn new(source_url: impl Into<String>, timestamp: i64, body: EventBody) -> Self {
        Self {
            source_url: source_url.into(),
            timestamp,
            body,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    pub fn stream_id(&self) -> Option<&StreamId> {
        self.body.stream_id()
    }

    pub fn message(&self) -> Option<&MessagePayload> {
        match &self.body {
            EventBody::Message(m) => Some(m),
            _ => None,
        }
    }

    /// SSE event name for messages, empty for every other kind.
    pub fn event_name(&self) -> &str {
        self.message().map(|m| m.event_name.as_str()).unwrap_or("")
    }
}

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_body() {
        let event = StreamEvent::new(
            "https://example.com/sse",
            1,
            EventBody::StreamClose(StreamLifecyclePayload::new(StreamSubtype::Reader, None)),
        );
        assert_eq!(event.kind(), EventKind::StreamClose);
        assert!(event.kind().closes_connection());
        assert_eq!(event.event_name(), "");
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&EventKind::StreamOpen).unwrap();
        assert_eq!(json, "\"stream-open\"");
        assert_eq!(EventKind::StreamOpen.to_string(), "stream-open");
    }

    #[test]
    fn test_message_payload_omits_absent_fields() {
        let payload = MessagePayload::new("hello", "message");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, serde_json::json!({"rawText": "hello", "eventName": "message"}));
    }

    #[test]
    fn test_diagnostic_kinds() {
        assert!(EventKind::Warn.is_diagnostic());
        assert!(EventKind::Init.is_diagnostic());
        assert!(!EventKind::Error.is_diagnostic());
    }
}
