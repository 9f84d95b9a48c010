use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use streamscope_intercept::{EventSourceInit, FetchRequest, PageContext, ReadyState};
use streamscope_panel::PanelSession;

use crate::config::Config;
use crate::handlers::consume_response;
use crate::http::{HttpEventSource, HttpFetch};
use crate::pipeline::Pipeline;

#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub url: String,
    /// Open the URL as an EventSource instead of fetching it
    pub event_source: bool,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl WatchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            event_source: false,
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Watch a live endpoint until its stream ends or the user interrupts.
pub async fn watch(config: Config, client: reqwest::Client, request: WatchRequest) -> Result<PanelSession> {
    let page = PageContext::new()
        .with_fetch(Arc::new(HttpFetch::new(client.clone())))
        .with_event_source(Arc::new(HttpEventSource::new(client)));
    let (pipeline, page) = Pipeline::start(config, page).await?;
    tracing::info!(url = %request.url, event_source = request.event_source, "watching");

    let outcome = tokio::select! {
        result = drive(&page, &request) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, collecting captured events");
            Ok(())
        }
    };

    let session = pipeline.finish().await?;
    outcome.map(|_| session)
}

async fn drive(page: &PageContext, request: &WatchRequest) -> Result<()> {
    if request.event_source {
        let factory = page
            .event_source
            .as_ref()
            .ok_or_else(|| anyhow!("page has no EventSource"))?;
        let mut connection = factory
            .connect(&request.url, EventSourceInit::default())
            .await
            .context("failed to open EventSource")?;

        let mut dispatched = 0usize;
        while connection.next_event().await.is_some() {
            dispatched += 1;
            if connection.ready_state() == ReadyState::Closed {
                break;
            }
        }
        connection.close();
        tracing::info!(dispatched, "EventSource finished");
        return Ok(());
    }

    let fetch = page
        .fetch
        .as_ref()
        .ok_or_else(|| anyhow!("page has no fetch"))?;
    let mut fetch_request = FetchRequest::new(&request.url).with_method(&request.method);
    for (name, value) in &request.headers {
        fetch_request = fetch_request.with_header(name, value);
    }
    if let Some(body) = &request.body {
        fetch_request = fetch_request.with_body(body);
    }

    let response = fetch.fetch(fetch_request).await.context("fetch failed")?;
    let bytes = consume_response(page, response).await?;
    tracing::info!(bytes, "response consumed");
    Ok(())
}
