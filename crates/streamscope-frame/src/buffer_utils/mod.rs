mod buffering;
mod json_lines;
mod sse_parser;

pub use buffering::Utf8StreamDecoder;
pub use json_lines::{split_json_lines, ChunkFormat, JsonLine, JsonLinesBuffer};
pub use sse_parser::{parse_frames, FrameParser, SseFrame, DEFAULT_EVENT_NAME};
