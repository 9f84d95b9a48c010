use std::io::Write;

use anyhow::Result;
use streamscope_panel::RequestGroup;
use streamscope_types::{EventBody, StreamEvent};

/// How captured request groups are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON array of groups, events in wire form
    Json,
}

pub fn render_groups(out: &mut impl Write, groups: &[RequestGroup], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let values = groups
                .iter()
                .map(RequestGroup::to_value)
                .collect::<serde_json::Result<Vec<_>>>()?;
            serde_json::to_writer_pretty(&mut *out, &values)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            if groups.is_empty() {
                writeln!(out, "no stream events captured")?;
            }
            for group in groups {
                let state = if group.is_open { "open" } else { "closed" };
                writeln!(
                    out,
                    "{} [{}] {} messages, {} events ({})",
                    group.display_url,
                    group.key,
                    group.message_count(),
                    group.messages.len(),
                    state
                )?;
                for event in &group.messages {
                    writeln!(out, "  {}", describe(event))?;
                }
            }
        }
    }
    Ok(())
}

fn describe(event: &StreamEvent) -> String {
    match &event.body {
        EventBody::Message(message) => {
            let json = if message.parsed_json.is_some() { " json" } else { "" };
            format!("message<{}>{} {}", message.event_name, json, message.raw_text)
        }
        EventBody::Error(error) => match &error.message {
            Some(message) => format!("error {}", message),
            None => "error".to_string(),
        },
        EventBody::StreamOpen(lifecycle) | EventBody::StreamClose(lifecycle) => {
            format!("{} {}", event.kind(), lifecycle.subtype.as_str())
        }
        _ => event.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamscope_panel::PanelSession;
    use streamscope_types::{MessagePayload, StreamId};

    fn session() -> PanelSession {
        let mut session = PanelSession::new();
        let payload = MessagePayload::new("{\"x\":1}", "message")
            .with_parsed_json(Some(serde_json::json!({"x": 1})))
            .with_stream_id(Some(StreamId::from("s1")));
        session.push(StreamEvent::new(
            "https://example.com/sse?t=1",
            10,
            EventBody::Message(payload),
        ));
        session
    }

    #[test]
    fn test_text_output() {
        let mut out = Vec::new();
        render_groups(&mut out, &session().snapshot(), OutputFormat::Text).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("https://example.com/sse [s1] 1 messages"));
        assert!(text.contains("message<message> json {\"x\":1}"));
    }

    #[test]
    fn test_json_output() {
        let mut out = Vec::new();
        render_groups(&mut out, &session().snapshot(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["streamId"], "s1");
        assert_eq!(value[0]["messages"][0]["__sse_viewer"], true);
    }

    #[test]
    fn test_empty_text_output() {
        let mut out = Vec::new();
        render_groups(&mut out, &[], OutputFormat::Text).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "no stream events captured\n");
    }
}
