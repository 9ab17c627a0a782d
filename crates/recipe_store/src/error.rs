//! Gateway error types.

use thiserror::Error;

/// Errors that can occur while talking to a persistence backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The targeted record does not exist in the backend.
    #[error("Recipe not found: {0}")]
    NotFound(String),

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The stored collection could not be read back.
    #[error("Stored data under {key} is corrupt: {reason}")]
    CorruptState { key: String, reason: String },
}

impl GatewayError {
    /// Creates an unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Creates a corrupt state error.
    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptState {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
