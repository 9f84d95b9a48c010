use serde_json::Value;
use std::sync::Arc;

use streamscope_frame::parse_json;
use streamscope_types::{EventBody, MessagePayload};

use crate::emitter::EventEmitter;

pub const CONSOLE_LOG_SOURCE: &str = "console.log";
pub const CONSOLE_WARN_SOURCE: &str = "console.warn";

/// The page's console.
pub trait Console: Send + Sync {
    fn log(&self, args: &[Value]);
    fn warn(&self, args: &[Value]);
}

/// Console that writes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl Console for TracingConsole {
    fn log(&self, args: &[Value]) {
        tracing::info!(target: "console", "{}", join_args(args));
    }

    fn warn(&self, args: &[Value]) {
        tracing::warn!(target: "console", "{}", join_args(args));
    }
}

fn join_args(args: &[Value]) -> String {
    args.iter().map(display_arg).collect::<Vec<_>>().join(" ")
}

fn display_arg(arg: &Value) -> String {
    match arg {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Does any argument look like streamed data (SSE fields, a JSON object, token payloads)?
pub fn looks_like_stream_data(args: &[Value]) -> bool {
    args.iter().any(|arg| {
        let text = display_arg(arg);
        let trimmed = text.trim();
        text.contains("data:")
            || text.contains("event:")
            || (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || text.contains("\"type\"")
            || text.contains("\"token\"")
    })
}

/// Console decorator that copies stream-looking log lines into `message` events.
pub struct InstrumentedConsole {
    inner: Arc<dyn Console>,
    emitter: EventEmitter,
}

impl InstrumentedConsole {
    pub fn new(inner: Arc<dyn Console>, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }

    fn capture(&self, source: &str, event_name: &str, args: &[Value]) {
        let Some(first) = args.first() else {
            return;
        };
        if !looks_like_stream_data(args) {
            return;
        }

        let parsed = match first {
            Value::String(s) => parse_json(s),
            Value::Object(_) | Value::Array(_) => Some(first.clone()),
            _ => None,
        };
        tracing::debug!(source = %source, "console stream data detected");
        self.emitter.post(
            source,
            EventBody::Message(
                MessagePayload::new(display_arg(first), event_name).with_parsed_json(parsed),
            ),
        );
    }
}

impl Console for InstrumentedConsole {
    fn log(&self, args: &[Value]) {
        self.capture(CONSOLE_LOG_SOURCE, "console-log", args);
        self.inner.log(args);
    }

    fn warn(&self, args: &[Value]) {
        self.capture(CONSOLE_WARN_SOURCE, "console-warn", args);
        self.inner.warn(args);
    }
}
