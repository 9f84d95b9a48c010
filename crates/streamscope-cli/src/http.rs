//! reqwest-backed implementations of the page's network primitives.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Method;

use streamscope_frame::{parse_frame_stream, FrameStream, SseFrame};
use streamscope_intercept::{
    Body, ByteStreamReader, EventSourceConnection, EventSourceFactory, EventSourceInit,
    FetchPrimitive, FetchRequest, FetchResponse, InterceptError, MessageEvent, ReadyState,
    Result, SourceEvent,
};

/// `fetch` over a shared reqwest client. The response body is streamed, never buffered.
#[derive(Clone, Default)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchPrimitive for HttpFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|e| InterceptError::Request(format!("invalid method {}: {}", request.method, e)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| InterceptError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let reader = ByteStreamReader::new(response.bytes_stream());
        let response = headers.into_iter().fold(
            FetchResponse::new(url, status, Some(Body::new(Box::new(reader)))),
            |response, (name, value)| response.with_header(name, value),
        );
        Ok(response)
    }
}

/// EventSource over reqwest. Does not reconnect: a transport error or the end of the body
/// dispatches `error` and closes the connection.
#[derive(Clone, Default)]
pub struct HttpEventSource {
    client: reqwest::Client,
}

impl HttpEventSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSourceFactory for HttpEventSource {
    async fn connect(
        &self,
        url: &str,
        _init: EventSourceInit,
    ) -> Result<Box<dyn EventSourceConnection>> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| InterceptError::Request(e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        let accepted = response.status().is_success() && content_type.contains("text/event-stream");
        if !accepted {
            tracing::warn!(
                url,
                status = response.status().as_u16(),
                content_type = %content_type,
                "EventSource response rejected"
            );
        }

        Ok(Box::new(HttpEventSourceConnection {
            url: url.to_string(),
            frames: accepted.then(|| parse_frame_stream(response.bytes_stream())),
            state: ReadyState::Connecting,
            last_event_id: None,
        }))
    }
}

pub struct HttpEventSourceConnection {
    url: String,
    frames: Option<FrameStream<reqwest::Error>>,
    state: ReadyState,
    last_event_id: Option<String>,
}

#[async_trait]
impl EventSourceConnection for HttpEventSourceConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn next_event(&mut self) -> Option<SourceEvent> {
        if self.state == ReadyState::Closed {
            return None;
        }
        if self.state == ReadyState::Connecting {
            if self.frames.is_none() {
                self.state = ReadyState::Closed;
                return Some(SourceEvent::Error);
            }
            self.state = ReadyState::Open;
            return Some(SourceEvent::Open);
        }

        loop {
            let frames = self.frames.as_mut()?;
            match frames.next().await {
                Some(Ok(frame)) => {
                    if let Some(message) = dispatch_frame(frame, &mut self.last_event_id) {
                        return Some(SourceEvent::Message(message));
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!(url = %self.url, error = %err, "EventSource transport error");
                    self.state = ReadyState::Closed;
                    self.frames = None;
                    return Some(SourceEvent::Error);
                }
                None => {
                    tracing::debug!(url = %self.url, "EventSource body ended");
                    self.state = ReadyState::Closed;
                    self.frames = None;
                    return Some(SourceEvent::Error);
                }
            }
        }
    }

    fn ready_state(&self) -> ReadyState {
        self.state
    }

    fn last_event_id(&self) -> Option<String> {
        self.last_event_id.clone()
    }

    fn close(&mut self) {
        self.state = ReadyState::Closed;
        self.frames = None;
    }
}

/// Message for a parsed frame. An `id:` updates the last event id even when the frame has no
/// `data:` line, but only frames with data are dispatched.
fn dispatch_frame(frame: SseFrame, last_event_id: &mut Option<String>) -> Option<MessageEvent> {
    if let Some(id) = frame.id {
        *last_event_id = Some(id);
    }
    if !frame.has_data {
        return None;
    }
    let message = MessageEvent::new(frame.data).with_type(frame.event_name);
    Some(match last_event_id.as_ref() {
        Some(id) => message.with_last_event_id(id.clone()),
        None => message,
    })
}
