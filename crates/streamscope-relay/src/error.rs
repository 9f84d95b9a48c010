use thiserror::Error;

use crate::host::TabId;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Extension context invalidated")]
    ContextInvalidated,

    #[error("Port disconnected")]
    Disconnected,

    #[error("No async runtime available to open a port")]
    NoRuntime,

    #[error("Script injection into tab {tab} failed: {reason}")]
    Injection { tab: TabId, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
