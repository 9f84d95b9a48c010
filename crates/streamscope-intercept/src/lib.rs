//! Page-side interception of streaming network primitives.
//!
//! Each primitive a page uses to receive streamed data is a capability trait here
//! ([`EventSourceFactory`], [`ReadableStreams`], [`XhrFactory`], [`FetchPrimitive`],
//! [`Console`]). Interception wraps the page's implementation in a decorator that behaves
//! identically toward the caller and reports what it sees to an [`EventEmitter`].

pub mod console;
pub mod emitter;
pub mod error;
pub mod event_source;
pub mod fetch;
pub mod installer;
pub mod readable_stream;
pub mod xhr;

pub use console::{looks_like_stream_data, Console, InstrumentedConsole, TracingConsole};
pub use emitter::{ChannelSink, EventEmitter, EventSink, RecordingSink};
pub use error::{InterceptError, Result};
pub use event_source::{
    EventSourceConnection, EventSourceFactory, EventSourceInit, InstrumentedEventSource,
    InstrumentedEventSourceFactory, MessageEvent, ReadyState, ReadyStateConstants, SourceEvent,
};
pub use fetch::{is_stream_like, FetchPrimitive, FetchRequest, FetchResponse, InstrumentedFetch};
pub use installer::{install_interceptors, PageContext, Primitive};
pub use readable_stream::{
    Body, ByteStreamReader, InstrumentedReader, NativeReadableStreams, ReadResult,
    ReadableStreams, ReaderInterceptor, StreamReader,
};
pub use xhr::{
    InstrumentedXhr, InstrumentedXhrFactory, ReadyStateHandler, XhrFactory, XhrReadyState,
    XhrSnapshot, XmlHttpRequest, READY_STATE_CHANGE,
};
