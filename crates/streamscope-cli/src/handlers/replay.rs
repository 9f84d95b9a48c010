use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

use streamscope_intercept::{Body, FetchPrimitive, FetchRequest, FetchResponse, PageContext};
use streamscope_panel::PanelSession;
use streamscope_types::CaptureConfig;

use crate::config::Config;
use crate::handlers::consume_response;
use crate::pipeline::Pipeline;

/// Default URL a replayed capture is attributed to.
pub const REPLAY_URL: &str = "https://replay.local/stream";

/// `fetch` that answers every request with the same captured body, split into fixed chunks.
pub struct ReplayFetch {
    chunks: Vec<Bytes>,
    content_type: String,
}

impl ReplayFetch {
    pub fn new(body: &[u8], capture: &CaptureConfig) -> Self {
        let chunks = body
            .chunks(capture.chunk_size.max(1))
            .map(Bytes::copy_from_slice)
            .collect();
        Self {
            chunks,
            content_type: capture.content_type.clone(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl FetchPrimitive for ReplayFetch {
    async fn fetch(&self, request: FetchRequest) -> streamscope_intercept::Result<FetchResponse> {
        tracing::debug!(url = %request.url, chunks = self.chunks.len(), "replaying capture");
        let body = Body::from_chunks(self.chunks.clone());
        Ok(FetchResponse::new(request.url, 200, Some(body))
            .with_header("content-type", self.content_type.clone()))
    }
}

/// Run captured bytes through the full pipeline as if a page had fetched them.
pub async fn replay_bytes(config: Config, body: &[u8], url: &str) -> Result<PanelSession> {
    let fetch = Arc::new(ReplayFetch::new(body, &config.capture));
    tracing::info!(
        url,
        bytes = body.len(),
        chunks = fetch.chunk_count(),
        content_type = %config.capture.content_type,
        "replay starting"
    );

    let page = PageContext::new().with_fetch(fetch);
    let (pipeline, page) = Pipeline::start(config, page).await?;

    let outcome = async {
        let fetch = page
            .fetch
            .as_ref()
            .ok_or_else(|| anyhow!("page has no fetch"))?;
        let response = fetch.fetch(FetchRequest::new(url)).await?;
        consume_response(&page, response).await
    }
    .await;

    let session = pipeline.finish().await?;
    outcome.map(|_| session)
}

pub async fn replay_file(config: Config, path: &Path, url: &str) -> Result<PanelSession> {
    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    replay_bytes(config, &body, url).await
}
