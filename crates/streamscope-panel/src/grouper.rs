use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use streamscope_types::{NoiseFilter, StreamEvent, StreamId};

/// Identity of a request group: the stream id, or the query-less URL for events without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn for_event(event: &StreamEvent) -> Self {
        match event.stream_id() {
            Some(id) => GroupKey(id.as_str().to_string()),
            None => GroupKey(strip_query(&event.source_url).to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupKey {
    fn from(key: &str) -> Self {
        GroupKey(key.to_string())
    }
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Events belonging to one logical request or connection, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestGroup {
    pub key: GroupKey,
    pub display_url: String,
    pub stream_id: Option<StreamId>,
    pub messages: Vec<StreamEvent>,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub is_open: bool,
}

impl RequestGroup {
    fn new(key: GroupKey, event: &StreamEvent) -> Self {
        Self {
            key,
            display_url: strip_query(&event.source_url).to_string(),
            stream_id: event.stream_id().cloned(),
            messages: Vec::new(),
            first_timestamp: event.timestamp,
            last_timestamp: event.timestamp,
            is_open: false,
        }
    }

    fn push(&mut self, event: StreamEvent) {
        let kind = event.kind();
        if kind.opens_connection() {
            self.is_open = true;
        } else if kind.closes_connection() {
            self.is_open = false;
        }
        self.last_timestamp = event.timestamp;
        self.messages.push(event);
    }

    /// Number of `message` events in the group.
    pub fn message_count(&self) -> usize {
        self.messages.iter().filter(|e| e.message().is_some()).count()
    }

    /// JSON view with every event in wire form.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let messages = self
            .messages
            .iter()
            .map(StreamEvent::to_wire)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(json!({
            "key": self.key.as_str(),
            "displayUrl": self.display_url,
            "streamId": self.stream_id.as_ref().map(StreamId::as_str),
            "messages": messages,
            "firstTimestamp": self.first_timestamp,
            "lastTimestamp": self.last_timestamp,
            "isOpen": self.is_open,
        }))
    }
}

/// Partitions an event sequence into request groups.
#[derive(Debug, Clone)]
pub struct RequestGrouper {
    groups: Vec<RequestGroup>,
    index: HashMap<GroupKey, usize>,
    classifier: NoiseFilter,
}

impl Default for RequestGrouper {
    fn default() -> Self {
        Self::new(NoiseFilter::panel_default())
    }
}

impl RequestGrouper {
    /// `classifier` decides which groups count as AI chat for ordering.
    pub fn new(classifier: NoiseFilter) -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
            classifier,
        }
    }

    pub fn assign(&mut self, event: StreamEvent) -> GroupKey {
        let key = GroupKey::for_event(&event);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.groups.push(RequestGroup::new(key.clone(), &event));
                self.index.insert(key.clone(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[slot].push(event);
        key
    }

    /// AI-chat groups first, then newest first by first timestamp. Ties keep insertion order.
    pub fn groups(&self) -> Vec<&RequestGroup> {
        let mut ordered: Vec<&RequestGroup> = self.groups.iter().collect();
        ordered.sort_by(|a, b| {
            let a_ai = self.classifier.is_ai_chat(&a.display_url);
            let b_ai = self.classifier.is_ai_chat(&b.display_url);
            b_ai.cmp(&a_ai)
                .then_with(|| b.first_timestamp.cmp(&a.first_timestamp))
        });
        ordered
    }

    pub fn get(&self, key: &GroupKey) -> Option<&RequestGroup> {
        self.index.get(key).map(|&slot| &self.groups[slot])
    }

    pub fn into_groups(self) -> Vec<RequestGroup> {
        let order: Vec<GroupKey> = self.groups().into_iter().map(|g| g.key.clone()).collect();
        let mut by_key: HashMap<GroupKey, RequestGroup> = self
            .groups
            .into_iter()
            .map(|g| (g.key.clone(), g))
            .collect();
        order.iter().filter_map(|key| by_key.remove(key)).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.index.clear();
    }
}
