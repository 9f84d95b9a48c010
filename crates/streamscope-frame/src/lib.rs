//! Message framing for chunked streaming bodies.
//!
//! Pure, synchronous parsing: a carried buffer plus a new chunk goes in, complete
//! frames and the new leftover come out. Nothing here performs I/O except the
//! [`streaming`] helper, which only drives the same parser from an async byte stream.

pub mod buffer_utils;
pub mod json;
pub mod reassembly;
pub mod streaming;

pub use buffer_utils::{
    parse_frames, split_json_lines, ChunkFormat, FrameParser, JsonLine, JsonLinesBuffer, SseFrame,
    Utf8StreamDecoder, DEFAULT_EVENT_NAME,
};
pub use json::{json_event_name, parse_json};
pub use reassembly::{DecodedMessage, StreamReassembler};
pub use streaming::{parse_frame_stream, FrameStream};
