//! # Streamscope
//!
//! Observe server-sent-event style traffic inside a page and rebuild it as discrete messages
//! grouped by request.
//!
//! ## Overview
//!
//! - **Frame** chunked bodies into messages: SSE frames, JSON lines, split UTF-8 sequences
//! - **Intercept** the page's streaming primitives behind capability traits
//! - **Relay** events from the page to a panel over per-tab channels, with reconnection
//! - **Group** the event log by stream id or URL for display
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamscope::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (sink, mut events) = ChannelSink::channel();
//!     let emitter = EventEmitter::new(Arc::new(sink));
//!
//!     let mut page = PageContext::new();
//!     install_interceptors(&mut page, &emitter);
//!
//!     // ...hand `page` to whatever drives the network...
//!
//!     let mut session = PanelSession::new();
//!     while let Ok(event) = events.try_recv() {
//!         session.push(event);
//!     }
//!     for group in session.snapshot() {
//!         println!("{} ({} messages)", group.display_url, group.message_count());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`streamscope-types`**: event model, wire envelope, noise filter, config structs
//! - **`streamscope-frame`**: SSE / JSON-lines framing and UTF-8 reassembly
//! - **`streamscope-intercept`**: instrumented EventSource, reader, XHR, fetch and console
//! - **`streamscope-relay`**: bridge, forwarder and reconnecting panel client
//! - **`streamscope-panel`**: request grouping, session snapshots, language preference

pub mod prelude;

pub use streamscope_types::{
    BridgeConfig, CaptureConfig, EventBody, EventKind, FilterConfig, MessagePayload, NoiseFilter,
    RelayConfig, StreamEvent, StreamId, StreamSubtype, UrlPattern,
};

pub use streamscope_frame::{
    parse_frame_stream, parse_frames, parse_json, DecodedMessage, SseFrame, StreamReassembler,
};

pub use streamscope_intercept::{
    install_interceptors, Body, ChannelSink, EventEmitter, EventSink, EventSourceFactory,
    FetchPrimitive, FetchRequest, FetchResponse, InterceptError, PageContext, ReadResult,
    StreamReader, XhrFactory,
};

pub use streamscope_relay::{
    install_bridge, Bridge, ConnectionStatus, Forwarder, HostFlag, Injector, IsolatedWorld,
    PanelClient, RelayError, ScriptTarget, TabId,
};

pub use streamscope_panel::{
    resolve_language, FilePreferenceStore, GroupKey, Language, PanelError, PanelSession,
    RequestGroup, RequestGrouper,
};
