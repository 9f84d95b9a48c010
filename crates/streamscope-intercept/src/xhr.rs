use std::sync::{Arc, Mutex};

use streamscope_frame::{JsonLine, JsonLinesBuffer};
use streamscope_types::{EventBody, MessagePayload, StreamId, StreamLifecyclePayload, StreamSubtype};

use crate::emitter::EventEmitter;
use crate::error::Result;
use crate::fetch::is_stream_like;

pub const READY_STATE_CHANGE: &str = "readystatechange";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum XhrReadyState {
    Unsent,
    Opened,
    HeadersReceived,
    Loading,
    Done,
}

/// What a `readystatechange` handler can see of the request when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhrSnapshot {
    pub ready_state: XhrReadyState,
    pub content_type: Option<String>,
    /// Full response text received so far.
    pub response_text: String,
}

pub type ReadyStateHandler = Box<dyn FnMut(&XhrSnapshot) + Send>;

/// One XMLHttpRequest object.
pub trait XmlHttpRequest: Send {
    fn open(&mut self, method: &str, url: &str) -> Result<()>;

    fn send(&mut self, body: Option<String>) -> Result<()>;

    /// Replaces the single `onreadystatechange` slot.
    fn set_onreadystatechange(&mut self, handler: Option<ReadyStateHandler>);

    fn add_event_listener(&mut self, event_type: &str, listener: ReadyStateHandler);

    fn ready_state(&self) -> XhrReadyState;

    fn response_text(&self) -> String;

    fn response_header(&self, name: &str) -> Option<String>;
}

/// The XMLHttpRequest constructor.
pub trait XhrFactory: Send + Sync {
    fn create(&self) -> Box<dyn XmlHttpRequest>;
}

/// Per-request observation state, shared by every handler registration so repeated
/// notifications of one state are only acted on once.
struct XhrObserver {
    emitter: EventEmitter,
    request: Option<(String, String)>,
    stream_id: Option<StreamId>,
    stream_opened: bool,
    stream_closed: bool,
    received_len: usize,
    lines: JsonLinesBuffer,
}

impl XhrObserver {
    fn new(emitter: EventEmitter) -> Self {
        Self {
            emitter,
            request: None,
            stream_id: None,
            stream_opened: false,
            stream_closed: false,
            received_len: 0,
            lines: JsonLinesBuffer::new(),
        }
    }

    /// Called from `send()`; observation is inert before this.
    fn arm(&mut self, method: String, url: String) {
        tracing::debug!(url = %url, method = %method, "XHR send");
        self.request = Some((method, url));
        self.stream_id = None;
        self.stream_opened = false;
        self.stream_closed = false;
        self.received_len = 0;
        self.lines = JsonLinesBuffer::new();
    }

    fn observe(&mut self, snapshot: &XhrSnapshot) {
        let Some((method, url)) = self.request.clone() else {
            return;
        };

        match snapshot.ready_state {
            XhrReadyState::HeadersReceived if !self.stream_opened => {
                let content_type = snapshot.content_type.as_deref().unwrap_or_default();
                if is_stream_like(content_type) {
                    self.stream_opened = true;
                    let stream_id = StreamId::mint();
                    tracing::debug!(url = %url, content_type = %content_type, "XHR streaming detected");
                    self.emitter.post(
                        &url,
                        EventBody::StreamOpen(
                            StreamLifecyclePayload::new(
                                StreamSubtype::XhrStream,
                                Some(stream_id.clone()),
                            )
                            .with_method(method),
                        ),
                    );
                    self.stream_id = Some(stream_id);
                }
            }
            XhrReadyState::Loading => {
                self.consume(&url, &snapshot.response_text);
            }
            XhrReadyState::Done if self.stream_opened && !self.stream_closed => {
                self.consume(&url, &snapshot.response_text);
                let rest = self.lines.finish();
                self.emit_lines(&url, rest);

                self.stream_closed = true;
                tracing::debug!(url = %url, "XHR stream closed");
                self.emitter.post(
                    &url,
                    EventBody::StreamClose(StreamLifecyclePayload::new(
                        StreamSubtype::XhrStream,
                        self.stream_id.clone(),
                    )),
                );
            }
            _ => {}
        }
    }

    /// Emit the lines completed by the text appended since the last observation.
    fn consume(&mut self, url: &str, text: &str) {
        if text.len() <= self.received_len || !text.is_char_boundary(self.received_len) {
            return;
        }
        let suffix = &text[self.received_len..];
        self.received_len = text.len();

        tracing::debug!(url = %url, len = suffix.len(), "XHR chunk received");
        let lines = self.lines.push(suffix);
        self.emit_lines(url, lines);
    }

    /// Outside a detected stream only lines that decode as JSON are reported.
    fn emit_lines(&self, url: &str, lines: Vec<JsonLine>) {
        for line in lines {
            if !self.stream_opened && line.parsed.is_none() {
                continue;
            }
            let event_name = line.event_name().to_string();
            let payload = MessagePayload::new(line.raw, event_name)
                .with_parsed_json(line.parsed)
                .with_stream_id(self.stream_id.clone());
            self.emitter.post(url, EventBody::Message(payload));
        }
    }
}

/// Routes one platform notification through the observer, then to the page's own handler.
fn observed(observer: Arc<Mutex<XhrObserver>>, mut handler: Option<ReadyStateHandler>) -> ReadyStateHandler {
    Box::new(move |snapshot: &XhrSnapshot| {
        if let Ok(mut observer) = observer.lock() {
            observer.observe(snapshot);
        }
        if let Some(handler) = handler.as_mut() {
            handler(snapshot);
        }
    })
}

/// XMLHttpRequest decorator.
///
/// `onreadystatechange` and `addEventListener("readystatechange", ..)` registrations
/// are both routed through one observer.
pub struct InstrumentedXhr {
    inner: Box<dyn XmlHttpRequest>,
    observer: Arc<Mutex<XhrObserver>>,
    request: Option<(String, String)>,
    has_onreadystatechange: bool,
}

impl InstrumentedXhr {
    pub fn new(inner: Box<dyn XmlHttpRequest>, emitter: EventEmitter) -> Self {
        Self {
            inner,
            observer: Arc::new(Mutex::new(XhrObserver::new(emitter))),
            request: None,
            has_onreadystatechange: false,
        }
    }
}

impl XmlHttpRequest for InstrumentedXhr {
    fn open(&mut self, method: &str, url: &str) -> Result<()> {
        self.request = Some((method.to_string(), url.to_string()));
        self.inner.open(method, url)
    }

    fn send(&mut self, body: Option<String>) -> Result<()> {
        if let Some((method, url)) = self.request.clone() {
            if let Ok(mut observer) = self.observer.lock() {
                observer.arm(method, url);
            }
        }
        if !self.has_onreadystatechange {
            self.inner
                .set_onreadystatechange(Some(observed(Arc::clone(&self.observer), None)));
            self.has_onreadystatechange = true;
        }
        self.inner.send(body)
    }

    fn set_onreadystatechange(&mut self, handler: Option<ReadyStateHandler>) {
        self.has_onreadystatechange = true;
        self.inner
            .set_onreadystatechange(Some(observed(Arc::clone(&self.observer), handler)));
    }

    fn add_event_listener(&mut self, event_type: &str, listener: ReadyStateHandler) {
        if event_type == READY_STATE_CHANGE {
            self.inner.add_event_listener(
                event_type,
                observed(Arc::clone(&self.observer), Some(listener)),
            );
        } else {
            self.inner.add_event_listener(event_type, listener);
        }
    }

    fn ready_state(&self) -> XhrReadyState {
        self.inner.ready_state()
    }

    fn response_text(&self) -> String {
        self.inner.response_text()
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.inner.response_header(name)
    }
}

pub struct InstrumentedXhrFactory {
    inner: Arc<dyn XhrFactory>,
    emitter: EventEmitter,
}

impl InstrumentedXhrFactory {
    pub fn new(inner: Arc<dyn XhrFactory>, emitter: EventEmitter) -> Self {
        Self { inner, emitter }
    }
}

impl XhrFactory for InstrumentedXhrFactory {
    fn create(&self) -> Box<dyn XmlHttpRequest> {
        Box::new(InstrumentedXhr::new(self.inner.create(), self.emitter.clone()))
    }
}
