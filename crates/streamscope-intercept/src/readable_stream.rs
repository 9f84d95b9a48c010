use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use streamscope_frame::{DecodedMessage, StreamReassembler, Utf8StreamDecoder};
use streamscope_types::{EventBody, MessagePayload, StreamId, StreamLifecyclePayload, StreamSubtype};

use crate::emitter::EventEmitter;
use crate::error::{InterceptError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Chunk(Bytes),
    Done,
}

/// A locked reader over a response body.
#[async_trait]
pub trait StreamReader: Send {
    async fn read(&mut self) -> Result<ReadResult>;
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Reader over any async byte stream (a network body, a replayed capture).
pub struct ByteStreamReader {
    inner: ByteStream,
}

impl ByteStreamReader {
    pub fn new<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
        B: Into<Bytes> + 'static,
        E: fmt::Display + 'static,
    {
        let inner = stream.map(|item| item.map(Into::into).map_err(InterceptError::transport));
        Self {
            inner: Box::pin(inner),
        }
    }

    /// Reader that yields the given chunks in order, then `Done`.
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(futures::stream::iter(
            chunks.into_iter().map(Ok::<_, std::convert::Infallible>),
        ))
    }
}

#[async_trait]
impl StreamReader for ByteStreamReader {
    async fn read(&mut self) -> Result<ReadResult> {
        match self.inner.next().await {
            Some(Ok(chunk)) => Ok(ReadResult::Chunk(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(ReadResult::Done),
        }
    }
}

/// A response body stream. The origin URL is set by the fetch adapter for stream-like
/// responses and is what marks the body for instrumentation.
pub struct Body {
    reader: Box<dyn StreamReader>,
    origin_url: Option<String>,
}

impl Body {
    pub fn new(reader: Box<dyn StreamReader>) -> Self {
        Self {
            reader,
            origin_url: None,
        }
    }

    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(Box::new(ByteStreamReader::from_chunks(chunks)))
    }

    pub fn origin_url(&self) -> Option<&str> {
        self.origin_url.as_deref()
    }

    pub(crate) fn tag(&mut self, url: &str) {
        self.origin_url = Some(url.to_string());
    }

    /// Drain the body into text, bypassing any reader instrumentation.
    pub async fn read_to_string(mut self) -> Result<String> {
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();
        loop {
            match self.reader.read().await? {
                ReadResult::Chunk(bytes) => text.push_str(&decoder.decode(&bytes)),
                ReadResult::Done => break,
            }
        }
        text.push_str(&decoder.finish());
        Ok(text)
    }

    pub(crate) fn into_reader(self) -> Box<dyn StreamReader> {
        self.reader
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("origin_url", &self.origin_url)
            .finish_non_exhaustive()
    }
}

/// The page's `getReader()` entry point.
pub trait ReadableStreams: Send + Sync {
    fn get_reader(&self, body: Body) -> Box<dyn StreamReader>;
}

/// Uninstrumented `getReader()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeReadableStreams;

impl ReadableStreams for NativeReadableStreams {
    fn get_reader(&self, body: Body) -> Box<dyn StreamReader> {
        body.into_reader()
    }
}

/// `getReader()` decorator. Untagged bodies pass straight through.
pub struct ReaderInterceptor {
    inner: Arc<dyn ReadableStreams>,
    emitter: EventEmitter,
}

impl ReaderInterceptor {
    pub fn new(inner: Arc<dyn ReadableStreams>, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }
}

impl ReadableStreams for ReaderInterceptor {
    fn get_reader(&self, body: Body) -> Box<dyn StreamReader> {
        let url = match body.origin_url() {
            Some(url) => url.to_string(),
            None => return self.inner.get_reader(body),
        };

        let reader = self.inner.get_reader(body);
        Box::new(InstrumentedReader::new(reader, url, self.emitter.clone()))
    }
}

/// Reader decorator that reassembles messages from the bytes it hands back.
pub struct InstrumentedReader {
    inner: Box<dyn StreamReader>,
    url: String,
    stream_id: StreamId,
    reassembler: StreamReassembler,
    emitter: EventEmitter,
    closed: bool,
}

impl InstrumentedReader {
    /// Mints the stream id and reports `stream-open` immediately.
    pub fn new(inner: Box<dyn StreamReader>, url: String, emitter: EventEmitter) -> Self {
        let stream_id = StreamId::mint();
        tracing::debug!(url = %url, stream_id = %stream_id, "intercepted getReader for stream body");
        emitter.post(
            &url,
            EventBody::StreamOpen(StreamLifecyclePayload::new(
                StreamSubtype::Reader,
                Some(stream_id.clone()),
            )),
        );

        Self {
            inner,
            url,
            stream_id,
            reassembler: StreamReassembler::new(),
            emitter,
            closed: false,
        }
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    fn emit_messages(&self, messages: Vec<DecodedMessage>) {
        for message in messages {
            let payload = MessagePayload::new(message.raw_text, message.event_name)
                .with_event_id(message.event_id)
                .with_retry(message.retry)
                .with_parsed_json(message.json)
                .with_stream_id(Some(self.stream_id.clone()));
            self.emitter.post(&self.url, EventBody::Message(payload));
        }
    }
}

#[async_trait]
impl StreamReader for InstrumentedReader {
    async fn read(&mut self) -> Result<ReadResult> {
        let result = self.inner.read().await?;

        match &result {
            ReadResult::Chunk(bytes) => {
                tracing::debug!(url = %self.url, len = bytes.len(), "chunk received");
                let messages = self.reassembler.push_bytes(bytes);
                self.emit_messages(messages);
            }
            ReadResult::Done if !self.closed => {
                self.closed = true;
                let messages = self.reassembler.finish();
                self.emit_messages(messages);

                tracing::debug!(url = %self.url, stream_id = %self.stream_id, "stream done");
                self.emitter.post(
                    &self.url,
                    EventBody::StreamClose(StreamLifecyclePayload::new(
                        StreamSubtype::Reader,
                        Some(self.stream_id.clone()),
                    )),
                );
            }
            ReadResult::Done => {}
        }

        Ok(result)
    }
}
