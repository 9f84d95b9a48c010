use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier minted once per intercepted reader or connection instance.
///
/// Disambiguates concurrent connections to the same URL. Never reused, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Mint a fresh identifier (`stream_<millis>_<random>`).
    pub fn mint() -> Self {
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "stream_{}_{}",
            chrono::Utc::now().timestamp_millis(),
            &random[..12]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
