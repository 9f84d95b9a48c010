//! Wire envelope shared by every context boundary.
//!
//! ```text
//! { "__sse_viewer": true, "kind": "...", "sourceUrl": "...", "timestamp": 0, "payload": {} }
//! ```
//!
//! The marker property distinguishes our traffic from anything else sharing the channel.
//! Consumers ignore any value that lacks it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{EventBody, EventKind, StreamEvent};

/// Sentinel property carried by every envelope.
pub const WIRE_MARKER: &str = "__sse_viewer";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(rename = "__sse_viewer")]
    marker: bool,
    kind: EventKind,
    source_url: String,
    timestamp: i64,
    #[serde(default)]
    payload: Value,
}

/// True when `value` carries the marker property set to `true`.
pub fn has_marker(value: &Value) -> bool {
    matches!(value.get(WIRE_MARKER), Some(Value::Bool(true)))
}

impl StreamEvent {
    /// Encode into the wire envelope.
    pub fn to_wire(&self) -> serde_json::Result<Value> {
        let envelope = WireEnvelope {
            marker: true,
            kind: self.kind(),
            source_url: self.source_url.clone(),
            timestamp: self.timestamp,
            payload: self.body.payload_value()?,
        };
        serde_json::to_value(envelope)
    }

    /// Decode a wire envelope. Returns `None` for foreign or malformed traffic.
    pub fn from_wire(value: &Value) -> Option<StreamEvent> {
        if !has_marker(value) {
            return None;
        }
        let envelope: WireEnvelope = serde_json::from_value(value.clone()).ok()?;
        let payload = match envelope.payload {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let body = EventBody::from_payload(envelope.kind, payload).ok()?;
        Some(StreamEvent {
            source_url: envelope.source_url,
            timestamp: envelope.timestamp,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ClosePayload, MessagePayload};
    use crate::StreamId;
    use serde_json::json;

    #[test]
    fn test_message_envelope_shape() {
        let event = StreamEvent::new(
            "https://api.example.com/v1/chat",
            42,
            EventBody::Message(
                MessagePayload::new("{\"x\":1}", "message")
                    .with_parsed_json(Some(json!({"x": 1})))
                    .with_stream_id(Some(StreamId::from("stream_1_a"))),
            ),
        );

        let wire = event.to_wire().unwrap();
        assert_eq!(wire["__sse_viewer"], json!(true));
        assert_eq!(wire["kind"], json!("message"));
        assert_eq!(wire["sourceUrl"], json!("https://api.example.com/v1/chat"));
        assert_eq!(wire["payload"]["parsedJson"], json!({"x": 1}));
        assert_eq!(wire["payload"]["streamId"], json!("stream_1_a"));

        assert_eq!(StreamEvent::from_wire(&wire), Some(event));
    }

    #[test]
    fn test_value_without_marker_is_ignored() {
        let foreign = json!({"kind": "message", "sourceUrl": "x", "timestamp": 1, "payload": {}});
        assert!(!has_marker(&foreign));
        assert!(StreamEvent::from_wire(&foreign).is_none());

        let false_marker = json!({"__sse_viewer": false, "kind": "close", "sourceUrl": "x", "timestamp": 1});
        assert!(StreamEvent::from_wire(&false_marker).is_none());
    }

    #[test]
    fn test_missing_payload_decodes_for_close() {
        let value = json!({"__sse_viewer": true, "kind": "close", "sourceUrl": "x", "timestamp": 3});
        let event = StreamEvent::from_wire(&value).unwrap();
        assert_eq!(event.body, EventBody::Close(ClosePayload::default()));
    }

    #[test]
    fn test_payload_shape_mismatch_is_ignored() {
        let value = json!({"__sse_viewer": true, "kind": "warn", "sourceUrl": "x", "timestamp": 3, "payload": {}});
        assert!(StreamEvent::from_wire(&value).is_none());
    }
}
