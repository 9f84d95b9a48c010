pub mod replay;
pub mod watch;

use anyhow::{anyhow, Result};

use streamscope_intercept::{is_stream_like, FetchResponse, PageContext, ReadResult};

/// Consume a fetch response the way a streaming page would: stream-like bodies through
/// `getReader()`, anything else through `text()`. Returns the number of bytes read.
pub(crate) async fn consume_response(page: &PageContext, response: FetchResponse) -> Result<usize> {
    let stream_like = response.content_type().map(is_stream_like).unwrap_or(false);
    tracing::debug!(
        url = %response.url(),
        status = response.status(),
        stream_like,
        "response received"
    );

    if !stream_like {
        let text = response.text().await?;
        return Ok(text.len());
    }

    let Some(body) = response.into_body() else {
        return Ok(0);
    };
    let streams = page
        .readable_streams
        .as_ref()
        .ok_or_else(|| anyhow!("page has no readable streams"))?;

    let mut reader = streams.get_reader(body);
    let mut total = 0;
    loop {
        match reader.read().await? {
            ReadResult::Chunk(bytes) => total += bytes.len(),
            ReadResult::Done => break,
        }
    }
    Ok(total)
}
