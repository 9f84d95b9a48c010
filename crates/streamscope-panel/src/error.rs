use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Preference store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preference store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),
}

pub type Result<T> = std::result::Result<T, PanelError>;
