use streamscope_types::{NoiseFilter, StreamEvent};

use crate::grouper::{GroupKey, RequestGroup, RequestGrouper};

/// Everything the panel has received for one inspected tab.
///
/// The log is append-only until [`clear`](PanelSession::clear). Every snapshot re-applies the
/// panel noise filter and the user's filter text, then groups what is left.
#[derive(Debug, Clone)]
pub struct PanelSession {
    events: Vec<StreamEvent>,
    filter_text: String,
    noise: NoiseFilter,
}

impl Default for PanelSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelSession {
    pub fn new() -> Self {
        Self::with_filter(NoiseFilter::panel_default())
    }

    pub fn with_filter(noise: NoiseFilter) -> Self {
        Self {
            events: Vec::new(),
            filter_text: String::new(),
            noise,
        }
    }

    pub fn push(&mut self, event: StreamEvent) {
        tracing::trace!(url = %event.source_url, kind = %event.kind(), "session event");
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = StreamEvent>) {
        self.events.extend(events);
    }

    /// Case-insensitive substring matched against `"{url} {kind} {eventName}"`.
    pub fn set_filter_text(&mut self, text: &str) {
        self.filter_text = text.trim().to_lowercase();
    }

    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    pub fn events(&self) -> &[StreamEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn is_visible(&self, event: &StreamEvent) -> bool {
        if self.noise.is_noise(&event.source_url) {
            return false;
        }
        if self.filter_text.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {}",
            event.source_url,
            event.kind(),
            event.event_name()
        )
        .to_lowercase();
        haystack.contains(&self.filter_text)
    }

    pub fn visible_events(&self) -> impl Iterator<Item = &StreamEvent> {
        self.events.iter().filter(|e| self.is_visible(e))
    }

    /// Groups over the filtered log, in display order.
    pub fn snapshot(&self) -> Vec<RequestGroup> {
        let mut grouper = RequestGrouper::new(self.noise.clone());
        for event in self.visible_events() {
            grouper.assign(event.clone());
        }
        grouper.into_groups()
    }

    pub fn group(&self, key: &GroupKey) -> Option<RequestGroup> {
        self.snapshot().into_iter().find(|g| &g.key == key)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
