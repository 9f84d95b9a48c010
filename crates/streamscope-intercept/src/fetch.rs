use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use streamscope_frame::split_json_lines;
use streamscope_types::{
    ErrorPayload, EventBody, MessagePayload, StreamId, StreamLifecyclePayload, StreamSubtype,
};

use crate::emitter::EventEmitter;
use crate::error::{InterceptError, Result};
use crate::readable_stream::Body;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Emission target armed on a stream-like response, keyed by the request URL.
#[derive(Debug, Clone)]
struct ResponseTap {
    url: String,
    emitter: EventEmitter,
}

/// A resolved fetch response. Reading it (`text`, `json`, or taking the body for a
/// reader) consumes it, so a body can only be read one way.
#[derive(Debug)]
pub struct FetchResponse {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<Body>,
    tap: Option<ResponseTap>,
}

impl FetchResponse {
    pub fn new(url: impl Into<String>, status: u16, body: Option<Body>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body,
            tap: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn into_body(self) -> Option<Body> {
        self.body
    }

    fn tag(&mut self, request_url: &str, emitter: EventEmitter) {
        if let Some(body) = self.body.as_mut() {
            body.tag(request_url);
        }
        self.tap = Some(ResponseTap {
            url: request_url.to_string(),
            emitter,
        });
    }

    pub async fn text(self) -> Result<String> {
        let Some(ResponseTap { url, emitter }) = self.tap else {
            return Self::read_body(self.body).await;
        };

        let stream_id = StreamId::mint();
        tracing::debug!(url = %url, "response text() called");
        post_lifecycle(&emitter, &url, StreamSubtype::FetchText, &stream_id, true);

        let text = match Self::read_body(self.body).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "response text() failed");
                post_failure(&emitter, &url, StreamSubtype::FetchText, &stream_id, &e);
                return Err(e);
            }
        };

        for line in split_json_lines(&text) {
            let event_name = line.event_name().to_string();
            let payload = MessagePayload::new(line.raw, event_name)
                .with_parsed_json(line.parsed)
                .with_stream_id(Some(stream_id.clone()));
            emitter.post(&url, EventBody::Message(payload));
        }

        post_lifecycle(&emitter, &url, StreamSubtype::FetchText, &stream_id, false);
        Ok(text)
    }

    pub async fn json(self) -> Result<Value> {
        let Some(ResponseTap { url, emitter }) = self.tap else {
            let text = Self::read_body(self.body).await?;
            return Ok(serde_json::from_str(&text)?);
        };

        let stream_id = StreamId::mint();
        tracing::debug!(url = %url, "response json() called");
        post_lifecycle(&emitter, &url, StreamSubtype::FetchJson, &stream_id, true);

        let parsed = Self::read_body(self.body)
            .await
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(InterceptError::from));
        let value = match parsed {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "response json() failed");
                post_failure(&emitter, &url, StreamSubtype::FetchJson, &stream_id, &e);
                return Err(e);
            }
        };

        let payload = MessagePayload::new(value.to_string(), "message")
            .with_parsed_json(Some(value.clone()))
            .with_stream_id(Some(stream_id.clone()));
        emitter.post(&url, EventBody::Message(payload));

        post_lifecycle(&emitter, &url, StreamSubtype::FetchJson, &stream_id, false);
        Ok(value)
    }

    async fn read_body(body: Option<Body>) -> Result<String> {
        match body {
            Some(body) => body.read_to_string().await,
            None => Ok(String::new()),
        }
    }
}

fn post_lifecycle(
    emitter: &EventEmitter,
    url: &str,
    subtype: StreamSubtype,
    stream_id: &StreamId,
    opening: bool,
) {
    let payload = StreamLifecyclePayload::new(subtype, Some(stream_id.clone()));
    let body = if opening {
        EventBody::StreamOpen(payload)
    } else {
        EventBody::StreamClose(payload)
    };
    emitter.post(url, body);
}

/// A failed body read still closes the stream so its group does not stay open.
fn post_failure(
    emitter: &EventEmitter,
    url: &str,
    subtype: StreamSubtype,
    stream_id: &StreamId,
    err: &InterceptError,
) {
    emitter.post(
        url,
        EventBody::Error(ErrorPayload {
            stream_id: Some(stream_id.clone()),
            message: Some(err.to_string()),
            ready_state: None,
        }),
    );
    post_lifecycle(emitter, url, subtype, stream_id, false);
}

/// The page's `fetch`.
#[async_trait]
pub trait FetchPrimitive: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// Event-stream or JSON content type, case-insensitive.
pub fn is_stream_like(content_type: &str) -> bool {
    let content_type = content_type.to_lowercase();
    content_type.contains("text/event-stream") || content_type.contains("application/json")
}

/// `fetch` decorator: stream-like responses get their body tagged for the reader
/// interceptor and their `text()`/`json()` armed.
pub struct InstrumentedFetch {
    inner: Arc<dyn FetchPrimitive>,
    emitter: EventEmitter,
}

impl InstrumentedFetch {
    pub fn new(inner: Arc<dyn FetchPrimitive>, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }
}

#[async_trait]
impl FetchPrimitive for InstrumentedFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let url = request.url.clone();
        tracing::debug!(url = %url, "fetch called");
        let mut response = self.inner.fetch(request).await?;

        let stream_like = response.content_type().map(is_stream_like).unwrap_or(false);
        if stream_like && response.has_body() {
            tracing::debug!(
                url = %url,
                content_type = ?response.content_type(),
                "stream detected"
            );
            response.tag(&url, self.emitter.clone());
        }

        Ok(response)
    }
}
