use serde_json::Value;

/// Best-effort JSON decode. Anything that is not a complete JSON document yields `None`.
pub fn parse_json(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Event name carried inside a JSON object: `type`, then `event`, as long as it is a
/// non-empty string.
pub fn json_event_name(value: &Value) -> Option<&str> {
    ["type", "event"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|name| !name.is_empty())
}
