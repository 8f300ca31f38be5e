use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediafyError>;

#[derive(Debug, Error)]
pub enum MediafyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for MediafyError {
    fn from(err: reqwest::Error) -> Self {
        MediafyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for MediafyError {
    fn from(err: serde_json::Error) -> Self {
        MediafyError::Parse(err.to_string())
    }
}
