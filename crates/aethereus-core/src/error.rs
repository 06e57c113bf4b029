use thiserror::Error;

/// Errors raised while talking to the Aethereus backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP {status}")]
    Status {
        status: u16,
        /// `message` field of a JSON error body, when the server sent one
        message: Option<String>,
    },

    #[error("invalid response payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("this operation requires a signed-in user")]
    AuthRequired,

    #[error("failed to resolve identity token: {0}")]
    Token(String),

    #[error("request was cancelled")]
    Cancelled,
}

impl ApiError {
    /// Server-provided error text, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors raised while loading or saving client configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cannot determine config directory")]
    PathError,
}
