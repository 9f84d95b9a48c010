use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::json;
use streamscope_frame::{parse_frame_stream, FrameParser, StreamReassembler};

#[test]
fn test_every_split_point_yields_same_frames() {
    let input = "event: delta\ndata: {\"x\":1}\n\ndata: a\ndata: b\n\nid: 7\ndata: tail\n\n";

    let mut whole = FrameParser::new();
    let expected = whole.feed(input);
    assert_eq!(expected.len(), 3);

    for split in 0..=input.len() {
        let mut parser = FrameParser::new();
        let mut frames = parser.feed(&input[..split]);
        frames.extend(parser.feed(&input[split..]));
        assert_eq!(frames, expected, "split at {}", split);
    }
}

#[test]
fn test_multibyte_payload_split_mid_character() {
    let input = "data: {\"text\":\"héllo 🚀\"}\n\n".as_bytes();
    for split in 0..=input.len() {
        let mut stream = StreamReassembler::new();
        let mut messages = stream.push_bytes(&input[..split]);
        messages.extend(stream.push_bytes(&input[split..]));
        assert_eq!(messages.len(), 1, "split at {}", split);
        assert_eq!(messages[0].json, Some(json!({"text": "héllo 🚀"})));
    }
}

#[test]
fn test_json_lines_every_split_point() {
    let input = "{\"a\":1}\n{\"type\":\"delta\",\"b\":2}\n";
    for split in 0..=input.len() {
        let mut stream = StreamReassembler::new();
        let mut messages = stream.push_text(&input[..split]);
        messages.extend(stream.push_text(&input[split..]));
        messages.extend(stream.finish());

        assert_eq!(messages.len(), 2, "split at {}", split);
        assert_eq!(messages[0].json, Some(json!({"a": 1})));
        assert_eq!(messages[1].event_name, "delta");
    }
}

#[tokio::test]
async fn test_frame_stream_over_byte_chunks() {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"data: hel")),
        Ok(Bytes::from_static(b"lo\n\nevent: done\n")),
        Ok(Bytes::from_static(b"data: [DONE]\n\ndata: never")),
    ];

    let frames: Vec<_> = parse_frame_stream(stream::iter(chunks)).collect().await;
    assert_eq!(frames.len(), 2);

    let first = frames[0].as_ref().unwrap();
    assert_eq!(first.data, "hello");

    let second = frames[1].as_ref().unwrap();
    assert_eq!(second.event_name, "done");
    assert_eq!(second.data, "[DONE]");
    assert!(second.json.is_none());
}

#[tokio::test]
async fn test_frame_stream_stops_after_error() {
    let chunks: Vec<Result<Bytes, String>> = vec![
        Ok(Bytes::from_static(b"data: 1\n\n")),
        Err("connection reset".to_string()),
        Ok(Bytes::from_static(b"data: 2\n\n")),
    ];

    let items: Vec<_> = parse_frame_stream(stream::iter(chunks)).collect().await;
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert_eq!(items[1].as_ref().unwrap_err(), "connection reset");
}
