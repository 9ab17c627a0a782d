//! Catalog error types.

use entities::ValidationError;
use recipe_store::GatewayError;
use thiserror::Error;

use crate::PhotoError;

/// Errors reported by catalog operations.
///
/// Every failing mutation leaves the in-memory collection exactly as it was.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required field was missing or a value was out of range. Nothing was
    /// sent to the backend.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The targeted record is not in the collection.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The backend rejected or failed the write.
    #[error("Persistence error: {0}")]
    Persistence(GatewayError),

    /// Stored data could not be read back.
    #[error("Corrupt stored state: {0}")]
    CorruptState(String),

    /// The photo could not be encoded.
    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),

    /// The detail editor was asked to do something its current state does not
    /// allow.
    #[error("Editor is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl CatalogError {
    /// Creates a not found error.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Whether the error left the collection untouched because of bad input
    /// rather than a backend problem.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<ValidationError> for CatalogError {
    fn from(err: ValidationError) -> Self {
        Self::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<GatewayError> for CatalogError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::CorruptState { .. } => Self::CorruptState(err.to_string()),
            other => Self::Persistence(other),
        }
    }
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_errors_are_classified() {
        let corrupt: CatalogError = GatewayError::corrupt("recipes", "bad json").into();
        assert!(matches!(corrupt, CatalogError::CorruptState(_)));

        let outage: CatalogError = GatewayError::unavailable("offline").into();
        assert!(matches!(outage, CatalogError::Persistence(_)));
    }

    #[test]
    fn test_validation_error_conversion() {
        let err: CatalogError = ValidationError::empty("url").into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Invalid url: must not be empty");
    }
}
