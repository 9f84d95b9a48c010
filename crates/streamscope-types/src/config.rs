use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::filter::{NoiseFilter, UrlPattern};

/// Reconnection policy for the panel-to-forwarder leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

fn default_reconnect_interval_ms() -> u64 {
    3000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

/// Outbound buffering for the page-to-forwarder leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    500
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl BridgeConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// How a captured body is replayed through the instrumented path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_chunk_size() -> usize {
    64
}

fn default_content_type() -> String {
    "text/event-stream".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            content_type: default_content_type(),
        }
    }
}

impl CaptureConfig {
    /// A zero chunk size is treated as one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Extra substrings appended to the built-in allow/deny lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub extra_allow: Vec<String>,
    #[serde(default)]
    pub extra_deny: Vec<String>,
}

impl FilterConfig {
    /// Apply the extra substrings on top of `base`.
    pub fn apply(&self, base: NoiseFilter) -> NoiseFilter {
        let with_allow = self
            .extra_allow
            .iter()
            .fold(base, |f, needle| f.with_allow(UrlPattern::contains(needle)));
        self.extra_deny
            .iter()
            .fold(with_allow, |f, needle| f.with_deny(UrlPattern::contains(needle)))
    }
}
