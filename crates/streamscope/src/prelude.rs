//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust
//! use streamscope::prelude::*;
//! ```

pub use crate::{
    install_bridge, install_interceptors, Body, ChannelSink, ConnectionStatus, EventBody,
    EventEmitter, EventKind, EventSink, FetchPrimitive, FetchRequest, FetchResponse, Forwarder,
    GroupKey, HostFlag, IsolatedWorld, NoiseFilter, PageContext, PanelClient, PanelSession,
    RelayConfig, RequestGroup, StreamEvent, StreamId, StreamReassembler,
};
