use thiserror::Error;

use crate::error::ApiError;

#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("Remote conversations require a signed-in user")]
    AuthRequired,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
