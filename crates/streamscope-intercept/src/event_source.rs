use async_trait::async_trait;
use std::sync::Arc;

use streamscope_frame::{parse_json, DEFAULT_EVENT_NAME};
use streamscope_types::{
    ClosePayload, ErrorPayload, EventBody, MessagePayload, OpenPayload, StreamId,
};

use crate::emitter::EventEmitter;
use crate::error::Result;

/// Connection state as exposed by a platform EventSource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

impl ReadyState {
    pub const CONNECTING: u16 = 0;
    pub const OPEN: u16 = 1;
    pub const CLOSED: u16 = 2;

    pub fn as_u16(self) -> u16 {
        match self {
            ReadyState::Connecting => Self::CONNECTING,
            ReadyState::Open => Self::OPEN,
            ReadyState::Closed => Self::CLOSED,
        }
    }
}

/// The numeric constants a factory publishes alongside its constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyStateConstants {
    pub connecting: u16,
    pub open: u16,
    pub closed: u16,
}

impl Default for ReadyStateConstants {
    fn default() -> Self {
        Self {
            connecting: ReadyState::CONNECTING,
            open: ReadyState::OPEN,
            closed: ReadyState::CLOSED,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSourceInit {
    pub with_credentials: bool,
}

/// A dispatched message on an EventSource connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub data: String,
    /// Event type; empty means the default `message`.
    pub event_type: String,
    pub last_event_id: Option<String>,
}

impl MessageEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            event_type: DEFAULT_EVENT_NAME.to_string(),
            last_event_id: None,
        }
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn with_last_event_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = Some(id.into());
        self
    }
}

/// What a connection hands to its listeners, in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Open,
    Message(MessageEvent),
    Error,
}

/// One live EventSource connection. Listeners are modelled as pulling the next dispatched event.
#[async_trait]
pub trait EventSourceConnection: Send {
    fn url(&self) -> &str;

    /// Next dispatched event, `None` once the connection is closed for good.
    async fn next_event(&mut self) -> Option<SourceEvent>;

    fn ready_state(&self) -> ReadyState;

    fn last_event_id(&self) -> Option<String>;

    fn close(&mut self);
}

/// The EventSource constructor.
#[async_trait]
pub trait EventSourceFactory: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        init: EventSourceInit,
    ) -> Result<Box<dyn EventSourceConnection>>;

    fn ready_state_constants(&self) -> ReadyStateConstants {
        ReadyStateConstants::default()
    }
}

/// Factory decorator: every connection it opens reports its lifecycle to the emitter.
pub struct InstrumentedEventSourceFactory {
    inner: Arc<dyn EventSourceFactory>,
    emitter: EventEmitter,
}

impl InstrumentedEventSourceFactory {
    pub fn new(inner: Arc<dyn EventSourceFactory>, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }
}

#[async_trait]
impl EventSourceFactory for InstrumentedEventSourceFactory {
    async fn connect(
        &self,
        url: &str,
        init: EventSourceInit,
    ) -> Result<Box<dyn EventSourceConnection>> {
        let connection = self.inner.connect(url, init).await?;
        Ok(Box::new(InstrumentedEventSource::new(
            connection,
            url,
            self.emitter.clone(),
        )))
    }

    fn ready_state_constants(&self) -> ReadyStateConstants {
        self.inner.ready_state_constants()
    }
}

pub struct InstrumentedEventSource {
    inner: Box<dyn EventSourceConnection>,
    url: String,
    stream_id: StreamId,
    emitter: EventEmitter,
}

impl InstrumentedEventSource {
    pub fn new(inner: Box<dyn EventSourceConnection>, url: &str, emitter: EventEmitter) -> Self {
        let stream_id = StreamId::mint();
        tracing::debug!(url = %url, stream_id = %stream_id, "instrumented EventSource connection");
        Self {
            inner,
            url: url.to_string(),
            stream_id,
            emitter,
        }
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    fn report(&self, event: &SourceEvent) {
        let body = match event {
            SourceEvent::Open => EventBody::Open(OpenPayload {
                stream_id: Some(self.stream_id.clone()),
                last_event_id: self.inner.last_event_id(),
                ready_state: self.inner.ready_state().as_u16(),
            }),
            SourceEvent::Message(message) => {
                let event_name = if message.event_type.is_empty() {
                    DEFAULT_EVENT_NAME
                } else {
                    message.event_type.as_str()
                };
                let event_id = message
                    .last_event_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .or_else(|| self.inner.last_event_id().filter(|id| !id.is_empty()));

                EventBody::Message(
                    MessagePayload::new(message.data.clone(), event_name)
                        .with_event_id(event_id)
                        .with_parsed_json(parse_json(&message.data))
                        .with_stream_id(Some(self.stream_id.clone())),
                )
            }
            SourceEvent::Error => EventBody::Error(ErrorPayload {
                stream_id: Some(self.stream_id.clone()),
                message: None,
                ready_state: Some(self.inner.ready_state().as_u16()),
            }),
        };
        self.emitter.post(&self.url, body);
    }
}

#[async_trait]
impl EventSourceConnection for InstrumentedEventSource {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn next_event(&mut self) -> Option<SourceEvent> {
        let event = self.inner.next_event().await?;
        self.report(&event);
        Some(event)
    }

    fn ready_state(&self) -> ReadyState {
        self.inner.ready_state()
    }

    fn last_event_id(&self) -> Option<String> {
        self.inner.last_event_id()
    }

    fn close(&mut self) {
        self.emitter.post(
            &self.url,
            EventBody::Close(ClosePayload {
                stream_id: Some(self.stream_id.clone()),
            }),
        );
        self.inner.close();
    }
}
