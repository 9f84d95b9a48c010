use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use streamscope_types::{now_millis, EventBody, EventKind, NoiseFilter, StreamEvent};
use tokio::sync::mpsc;

/// Destination for emitted events (the page's `postMessage` equivalent).
///
/// Delivery is synchronous and infallible from the adapter's point of view; a sink that
/// cannot deliver drops or buffers on its own.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: StreamEvent);
}

/// Sink that forwards into an unbounded tokio channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped, discarding event");
        }
    }
}

/// Sink that keeps every delivered event in memory.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<StreamEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(StreamEvent::kind).collect()
    }

    pub fn take(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, event: StreamEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

struct EmitterInner {
    sink: Arc<dyn EventSink>,
    filter: NoiseFilter,
    last_timestamp: AtomicI64,
}

/// Shared, noise-filtered event poster used by every adapter on a page.
///
/// Timestamps are clamped so they never go backwards for one emitter, even if the
/// wall clock does.
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("last_timestamp", &self.inner.last_timestamp)
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::with_filter(sink, NoiseFilter::page_default())
    }

    pub fn with_filter(sink: Arc<dyn EventSink>, filter: NoiseFilter) -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                sink,
                filter,
                last_timestamp: AtomicI64::new(i64::MIN),
            }),
        }
    }

    pub fn filter(&self) -> &NoiseFilter {
        &self.inner.filter
    }

    /// Post one event. Returns `false` when the noise filter suppressed it.
    pub fn post(&self, source_url: &str, body: EventBody) -> bool {
        let kind = body.kind();
        if self.inner.filter.should_suppress(source_url, kind) {
            tracing::trace!(url = %source_url, kind = %kind, "suppressed noise event");
            return false;
        }

        let event = StreamEvent::new(source_url, self.next_timestamp(), body);
        self.inner.sink.deliver(event);
        true
    }

    fn next_timestamp(&self) -> i64 {
        let now = now_millis();
        let previous = self.inner.last_timestamp.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }
}
