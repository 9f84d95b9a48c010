mod common;

use serde_json::json;
use std::sync::Arc;

use common::{recording_emitter, CannedFetch, ScriptedEventSources, CHAT_URL};
use streamscope_intercept::{
    install_interceptors, FetchRequest, InterceptError, PageContext, Primitive, TracingConsole,
};
use streamscope_types::{EventBody, EventKind, StreamSubtype};

const JSON_URL: &str = "https://api.example.com/v1/chat/state";
const HTML_URL: &str = "https://example.com/index";

fn canned() -> CannedFetch {
    CannedFetch::default()
        .route(
            CHAT_URL,
            "text/event-stream",
            &[b"{\"type\":\"delta\",\"t\":\"a\"}\n", b"\ngarbage\n"],
        )
        .route(JSON_URL, "application/json; charset=utf-8", &[b"{\"done\":", b"true}"])
        .route(HTML_URL, "text/html", &[b"<html></html>"])
}

#[tokio::test]
async fn test_text_emits_one_message_per_line() {
    let (emitter, sink) = recording_emitter();
    let mut page = PageContext::new().with_fetch(Arc::new(canned()));
    install_interceptors(&mut page, &emitter);
    sink.take();

    let fetch = page.fetch.clone().unwrap();
    let response = fetch.fetch(FetchRequest::new(CHAT_URL)).await.unwrap();
    let text = response.text().await.unwrap();
    assert_eq!(text, "{\"type\":\"delta\",\"t\":\"a\"}\n\ngarbage\n");

    let events = sink.events();
    let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::StreamOpen,
            EventKind::Message,
            EventKind::Message,
            EventKind::StreamClose
        ]
    );
    match &events[0].body {
        EventBody::StreamOpen(open) => assert_eq!(open.subtype, StreamSubtype::FetchText),
        other => panic!("expected stream-open, got {:?}", other),
    }
    assert_eq!(events[1].event_name(), "delta");
    assert!(events[2].message().unwrap().parsed_json.is_none());
}

#[tokio::test]
async fn test_json_emits_reserialised_value() {
    let (emitter, sink) = recording_emitter();
    let mut page = PageContext::new().with_fetch(Arc::new(canned()));
    install_interceptors(&mut page, &emitter);
    sink.take();

    let response = page
        .fetch
        .as_ref()
        .unwrap()
        .fetch(FetchRequest::new(JSON_URL))
        .await
        .unwrap();
    let value = response.json().await.unwrap();
    assert_eq!(value, json!({"done": true}));

    let events = sink.events();
    assert_eq!(events.len(), 3);
    let message = events[1].message().unwrap();
    assert_eq!(message.raw_text, "{\"done\":true}");
    assert_eq!(message.parsed_json, Some(json!({"done": true})));
    match &events[2].body {
        EventBody::StreamClose(close) => assert_eq!(close.subtype, StreamSubtype::FetchJson),
        other => panic!("expected stream-close, got {:?}", other),
    }
}

#[tokio::test]
async fn test_json_failure_still_closes_stream() {
    let (emitter, sink) = recording_emitter();
    let mut page = PageContext::new().with_fetch(Arc::new(canned()));
    install_interceptors(&mut page, &emitter);
    sink.take();

    let response = page
        .fetch
        .as_ref()
        .unwrap()
        .fetch(FetchRequest::new(CHAT_URL))
        .await
        .unwrap();
    let err = response.json().await.unwrap_err();
    assert!(matches!(err, InterceptError::Json(_)));

    assert_eq!(
        sink.kinds(),
        vec![EventKind::StreamOpen, EventKind::Error, EventKind::StreamClose]
    );
}

#[tokio::test]
async fn test_non_stream_response_is_untouched() {
    let (emitter, sink) = recording_emitter();
    let mut page = PageContext::new().with_fetch(Arc::new(canned()));
    install_interceptors(&mut page, &emitter);
    sink.take();

    let response = page
        .fetch
        .as_ref()
        .unwrap()
        .fetch(FetchRequest::new(HTML_URL))
        .await
        .unwrap();
    assert!(response.body().unwrap().origin_url().is_none());
    assert_eq!(response.text().await.unwrap(), "<html></html>");
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_fetch_errors_pass_through() {
    let (emitter, _sink) = recording_emitter();
    let mut page = PageContext::new().with_fetch(Arc::new(canned()));
    install_interceptors(&mut page, &emitter);

    let result = page
        .fetch
        .as_ref()
        .unwrap()
        .fetch(FetchRequest::new("https://example.com/missing"))
        .await;
    assert!(matches!(result, Err(InterceptError::Request(_))));
}

#[test]
fn test_sealed_primitive_warns_and_others_install() {
    let (emitter, sink) = recording_emitter();
    let mut page = PageContext::new()
        .with_event_source(Arc::new(ScriptedEventSources::new(Vec::new())))
        .with_fetch(Arc::new(canned()))
        .with_console(Arc::new(TracingConsole));
    page.seal(Primitive::Fetch);
    page.seal(Primitive::Console);

    assert!(install_interceptors(&mut page, &emitter));

    let events = sink.events();
    let summary: Vec<_> = events
        .iter()
        .map(|e| (e.kind(), e.source_url.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (EventKind::Warn, "fetch-init"),
            (EventKind::Init, "SSE Viewer"),
            (EventKind::Warn, "console-init"),
        ]
    );

    match &events[1].body {
        EventBody::Init(notice) => assert_eq!(notice.message, "Interceptors installed successfully"),
        other => panic!("expected init, got {:?}", other),
    }

    // the sealed fetch is left as the page's own implementation
    tokio_test::block_on(async {
        let response = page
            .fetch
            .as_ref()
            .unwrap()
            .fetch(FetchRequest::new(CHAT_URL))
            .await
            .unwrap();
        assert!(response.body().unwrap().origin_url().is_none());
    });
}
