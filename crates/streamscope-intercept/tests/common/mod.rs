#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use streamscope_intercept::{
    Body, EventEmitter, EventSourceConnection, EventSourceFactory, EventSourceInit,
    FetchPrimitive, FetchRequest, FetchResponse, InterceptError, ReadyState, ReadyStateHandler,
    RecordingSink, Result, SourceEvent, XhrFactory, XhrReadyState, XhrSnapshot, XmlHttpRequest,
};

pub const CHAT_URL: &str = "https://api.example.com/v1/chat/completions";

pub fn recording_emitter() -> (EventEmitter, RecordingSink) {
    let sink = RecordingSink::new();
    (EventEmitter::new(Arc::new(sink.clone())), sink)
}

// ---------------------------------------------------------------------------
// EventSource

pub struct ScriptedConnection {
    url: String,
    events: VecDeque<SourceEvent>,
    state: ReadyState,
    last_event_id: Option<String>,
    closes: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EventSourceConnection for ScriptedConnection {
    fn url(&self) -> &str {
        &self.url
    }

    async fn next_event(&mut self) -> Option<SourceEvent> {
        let event = self.events.pop_front()?;
        match &event {
            SourceEvent::Open => self.state = ReadyState::Open,
            SourceEvent::Message(message) => {
                if message.last_event_id.is_some() {
                    self.last_event_id = message.last_event_id.clone();
                }
            }
            SourceEvent::Error => self.state = ReadyState::Connecting,
        }
        Some(event)
    }

    fn ready_state(&self) -> ReadyState {
        self.state
    }

    fn last_event_id(&self) -> Option<String> {
        self.last_event_id.clone()
    }

    fn close(&mut self) {
        self.state = ReadyState::Closed;
        self.closes.lock().unwrap().push(self.url.clone());
    }
}

/// Every connection replays the same script.
#[derive(Default)]
pub struct ScriptedEventSources {
    script: Vec<SourceEvent>,
    pub closes: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEventSources {
    pub fn new(script: Vec<SourceEvent>) -> Self {
        Self {
            script,
            closes: Arc::default(),
        }
    }
}

#[async_trait]
impl EventSourceFactory for ScriptedEventSources {
    async fn connect(
        &self,
        url: &str,
        _init: EventSourceInit,
    ) -> Result<Box<dyn EventSourceConnection>> {
        Ok(Box::new(ScriptedConnection {
            url: url.to_string(),
            events: self.script.clone().into(),
            state: ReadyState::Connecting,
            last_event_id: None,
            closes: Arc::clone(&self.closes),
        }))
    }
}

// ---------------------------------------------------------------------------
// XMLHttpRequest

#[derive(Default)]
pub struct XhrSlots {
    pub onreadystatechange: Option<ReadyStateHandler>,
    pub listeners: Vec<(String, ReadyStateHandler)>,
    pub opened: Option<(String, String)>,
    pub sent: bool,
    pub state: Option<XhrSnapshot>,
}

/// Test-side control over one fake XHR: fires notifications the way a browser would.
#[derive(Clone, Default)]
pub struct XhrHandle(pub Arc<Mutex<XhrSlots>>);

impl XhrHandle {
    pub fn fire(&self, ready_state: XhrReadyState, content_type: Option<&str>, response_text: &str) {
        let snapshot = XhrSnapshot {
            ready_state,
            content_type: content_type.map(str::to_string),
            response_text: response_text.to_string(),
        };
        let mut slots = self.0.lock().unwrap();
        slots.state = Some(snapshot.clone());
        if let Some(handler) = slots.onreadystatechange.as_mut() {
            handler(&snapshot);
        }
        for (event_type, listener) in slots.listeners.iter_mut() {
            if event_type == "readystatechange" {
                listener(&snapshot);
            }
        }
    }

    pub fn opened(&self) -> Option<(String, String)> {
        self.0.lock().unwrap().opened.clone()
    }

    pub fn sent(&self) -> bool {
        self.0.lock().unwrap().sent
    }
}

pub struct FakeXhr {
    handle: XhrHandle,
}

impl XmlHttpRequest for FakeXhr {
    fn open(&mut self, method: &str, url: &str) -> Result<()> {
        self.handle.0.lock().unwrap().opened = Some((method.to_string(), url.to_string()));
        Ok(())
    }

    fn send(&mut self, _body: Option<String>) -> Result<()> {
        self.handle.0.lock().unwrap().sent = true;
        Ok(())
    }

    fn set_onreadystatechange(&mut self, handler: Option<ReadyStateHandler>) {
        self.handle.0.lock().unwrap().onreadystatechange = handler;
    }

    fn add_event_listener(&mut self, event_type: &str, listener: ReadyStateHandler) {
        self.handle
            .0
            .lock()
            .unwrap()
            .listeners
            .push((event_type.to_string(), listener));
    }

    fn ready_state(&self) -> XhrReadyState {
        self.handle
            .0
            .lock()
            .unwrap()
            .state
            .as_ref()
            .map(|s| s.ready_state)
            .unwrap_or(XhrReadyState::Unsent)
    }

    fn response_text(&self) -> String {
        self.handle
            .0
            .lock()
            .unwrap()
            .state
            .as_ref()
            .map(|s| s.response_text.clone())
            .unwrap_or_default()
    }

    fn response_header(&self, name: &str) -> Option<String> {
        if !name.eq_ignore_ascii_case("content-type") {
            return None;
        }
        self.handle
            .0
            .lock()
            .unwrap()
            .state
            .as_ref()
            .and_then(|s| s.content_type.clone())
    }
}

#[derive(Default)]
pub struct FakeXhrFactory {
    pub created: Mutex<Vec<XhrHandle>>,
}

impl FakeXhrFactory {
    pub fn last(&self) -> XhrHandle {
        self.created.lock().unwrap().last().cloned().unwrap()
    }
}

impl XhrFactory for FakeXhrFactory {
    fn create(&self) -> Box<dyn XmlHttpRequest> {
        let handle = XhrHandle::default();
        self.created.lock().unwrap().push(handle.clone());
        Box::new(FakeXhr { handle })
    }
}

// ---------------------------------------------------------------------------
// fetch

#[derive(Clone)]
struct Route {
    content_type: String,
    chunks: Vec<Bytes>,
}

/// Serves canned bodies by URL; unknown URLs fail like a network error.
#[derive(Default)]
pub struct CannedFetch {
    routes: Mutex<HashMap<String, Route>>,
}

impl CannedFetch {
    pub fn route(self, url: &str, content_type: &str, chunks: &[&'static [u8]]) -> Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                content_type: content_type.to_string(),
                chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
            },
        );
        self
    }
}

#[async_trait]
impl FetchPrimitive for CannedFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let route = self
            .routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| InterceptError::Request(format!("no route for {}", request.url)))?;

        Ok(
            FetchResponse::new(&request.url, 200, Some(Body::from_chunks(route.chunks)))
                .with_header("Content-Type", route.content_type),
        )
    }
}

/// Hands out one prepared response.
pub struct Passthrough {
    response: Mutex<Option<FetchResponse>>,
}

impl Passthrough {
    pub fn new(response: FetchResponse) -> Self {
        Self {
            response: Mutex::new(Some(response)),
        }
    }
}

#[async_trait]
impl FetchPrimitive for Passthrough {
    async fn fetch(&self, _request: FetchRequest) -> Result<FetchResponse> {
        self.response
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| InterceptError::Request("response already taken".to_string()))
    }
}
