mod common;

use bytes::Bytes;
use futures::stream;
use serde_json::json;
use std::sync::Arc;

use common::{recording_emitter, CannedFetch, Passthrough, CHAT_URL};
use streamscope_intercept::{
    install_interceptors, Body, ByteStreamReader, FetchPrimitive, FetchRequest, FetchResponse,
    InstrumentedFetch, InterceptError, PageContext, ReadResult, RecordingSink, StreamReader,
};
use streamscope_types::{EventBody, EventKind, StreamSubtype};

async fn drain(reader: &mut Box<dyn StreamReader>) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    while let ReadResult::Chunk(bytes) = reader.read().await.unwrap() {
        chunks.push(bytes);
    }
    chunks
}

fn page_with(fetch: CannedFetch) -> (PageContext, RecordingSink) {
    let (emitter, sink) = recording_emitter();
    let mut page = PageContext::new().with_fetch(Arc::new(fetch));
    install_interceptors(&mut page, &emitter);
    sink.take();
    (page, sink)
}

#[tokio::test]
async fn test_end_to_end_stream_body() {
    let fetch = CannedFetch::default().route(
        CHAT_URL,
        "text/event-stream",
        &[b"data: {\"x\"", b":1}\n", b"\n"],
    );
    let (page, sink) = page_with(fetch);

    let response = page
        .fetch
        .as_ref()
        .unwrap()
        .fetch(FetchRequest::new(CHAT_URL))
        .await
        .unwrap();
    let body = response.into_body().unwrap();
    assert_eq!(body.origin_url(), Some(CHAT_URL));

    let mut reader = page.readable_streams.as_ref().unwrap().get_reader(body);
    let chunks = drain(&mut reader).await;
    assert_eq!(chunks.len(), 3, "caller sees the original chunks");

    let events = sink.events();
    let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::StreamOpen, EventKind::Message, EventKind::StreamClose]
    );

    let stream_id = events[0].stream_id().cloned().unwrap();
    assert!(events.iter().all(|e| e.stream_id() == Some(&stream_id)));
    assert!(events.iter().all(|e| e.source_url == CHAT_URL));

    match &events[0].body {
        EventBody::StreamOpen(open) => assert_eq!(open.subtype, StreamSubtype::Reader),
        other => panic!("expected stream-open, got {:?}", other),
    }
    assert_eq!(events[1].message().unwrap().parsed_json, Some(json!({"x": 1})));
}

#[tokio::test]
async fn test_untagged_body_passes_through() {
    let (page, sink) = page_with(CannedFetch::default());

    let body = Body::from_chunks(vec![Bytes::from_static(b"data: hidden\n\n")]);
    let mut reader = page.readable_streams.as_ref().unwrap().get_reader(body);
    let chunks = drain(&mut reader).await;

    assert_eq!(chunks.len(), 1);
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_stream_identity_per_reader() {
    let fetch = CannedFetch::default().route(
        CHAT_URL,
        "application/json",
        &[b"{\"type\":\"token\",\"t\":\"a\"}\n{\"type\":\"tok", b"en\",\"t\":\"b\"}\n"],
    );
    let (page, sink) = page_with(fetch);
    let fetch = page.fetch.clone().unwrap();
    let streams = page.readable_streams.clone().unwrap();

    for _ in 0..2 {
        let response = fetch.fetch(FetchRequest::new(CHAT_URL)).await.unwrap();
        let mut reader = streams.get_reader(response.into_body().unwrap());
        drain(&mut reader).await;
    }

    let events = sink.events();
    // two readers x (open + 2 messages + close)
    assert_eq!(events.len(), 8);

    let first = events[0].stream_id().cloned().unwrap();
    let second = events[4].stream_id().cloned().unwrap();
    assert_ne!(first, second);
    assert!(events[..4].iter().all(|e| e.stream_id() == Some(&first)));
    assert!(events[4..].iter().all(|e| e.stream_id() == Some(&second)));

    let tokens: Vec<_> = events[..4]
        .iter()
        .filter_map(|e| e.message())
        .map(|m| m.event_name.clone())
        .collect();
    assert_eq!(tokens, vec!["token", "token"]);
}

#[tokio::test]
async fn test_stream_close_is_reported_once() {
    let fetch = CannedFetch::default().route(CHAT_URL, "text/event-stream", &[b"data: a\n\n"]);
    let (page, sink) = page_with(fetch);

    let response = page
        .fetch
        .as_ref()
        .unwrap()
        .fetch(FetchRequest::new(CHAT_URL))
        .await
        .unwrap();
    let mut reader = page
        .readable_streams
        .as_ref()
        .unwrap()
        .get_reader(response.into_body().unwrap());
    drain(&mut reader).await;
    assert_eq!(reader.read().await.unwrap(), ReadResult::Done);

    let closes = sink
        .kinds()
        .into_iter()
        .filter(|k| *k == EventKind::StreamClose)
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_read_error_reaches_caller() {
    let (page, sink) = page_with(CannedFetch::default());

    let failing = ByteStreamReader::new(stream::iter(vec![
        Ok(Bytes::from_static(b"data: one\n\n")),
        Err("connection reset"),
    ]));
    let body = tag(Body::new(Box::new(failing))).await;

    let mut reader = page.readable_streams.as_ref().unwrap().get_reader(body);
    assert!(matches!(reader.read().await, Ok(ReadResult::Chunk(_))));
    match reader.read().await {
        Err(InterceptError::Transport(message)) => assert_eq!(message, "connection reset"),
        other => panic!("expected transport error, got {:?}", other),
    }

    assert_eq!(sink.kinds(), vec![EventKind::StreamOpen, EventKind::Message]);
}

/// Bodies are only tagged by the fetch adapter; route one through it.
async fn tag(body: Body) -> Body {
    let (emitter, _sink) = recording_emitter();
    let response = FetchResponse::new(CHAT_URL, 200, Some(body))
        .with_header("content-type", "text/event-stream");
    let fetch = InstrumentedFetch::new(Arc::new(Passthrough::new(response)), emitter);
    fetch
        .fetch(FetchRequest::new(CHAT_URL))
        .await
        .unwrap()
        .into_body()
        .unwrap()
}
