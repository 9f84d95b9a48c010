use thiserror::Error;

pub type Result<T> = std::result::Result<T, InterceptError>;

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Failed to instrument {primitive}: {reason}")]
    Install {
        primitive: &'static str,
        reason: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InterceptError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        InterceptError::Transport(err.to_string())
    }
}
