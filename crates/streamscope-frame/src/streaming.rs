use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::buffer_utils::{FrameParser, SseFrame, Utf8StreamDecoder};

pub type FrameStream<E> = Pin<Box<dyn Stream<Item = Result<SseFrame, E>> + Send>>;

/// Frame an async byte stream as strict SSE (the way a native EventSource reads).
///
/// Transport errors are passed through; the stream ends after the first one.
/// Text after the last blank line is dropped at end of stream.
pub fn parse_frame_stream<S, B, E>(byte_stream: S) -> FrameStream<E>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(byte_stream);
        let mut decoder = Utf8StreamDecoder::new();
        let mut parser = FrameParser::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    let text = decoder.decode(bytes.as_ref());
                    for frame in parser.feed(&text) {
                        yield Ok(frame);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }

        let leftover = parser.finish();
        if !leftover.is_empty() {
            tracing::debug!(bytes = leftover.len(), "dropping unterminated SSE frame at end of stream");
        }
    })
}
