pub mod config;
pub mod events;
pub mod filter;
pub mod stream_id;
pub mod wire;

pub use config::{BridgeConfig, CaptureConfig, FilterConfig, RelayConfig};
pub use events::{
    now_millis, ClosePayload, ErrorPayload, EventBody, EventKind, MessagePayload, NoticePayload,
    OpenPayload, StreamEvent, StreamLifecyclePayload, StreamSubtype,
};
pub use filter::{NoiseFilter, UrlPattern};
pub use stream_id::StreamId;
pub use wire::{has_marker, WIRE_MARKER};
