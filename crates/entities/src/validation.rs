//! Validation helpers shared by the entity constructors.

use thiserror::Error;

/// A required field was missing or a value was out of range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human readable reason.
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error for the given field.
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    /// Creates a "must not be empty" error.
    pub fn empty(field: &'static str) -> Self {
        Self::new(field, "must not be empty")
    }
}

/// Trims a required text field, failing if nothing is left.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty(field));
    }
    Ok(trimmed.to_string())
}

/// Trims optional free text, mapping blank input to `None`.
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Normalizes a category: surrounding whitespace is dropped and a blank
/// category means "uncategorized".
pub fn normalize_category(category: Option<&str>) -> Option<String> {
    optional_text(category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("name", "  Curry ").unwrap(), "Curry");
        let err = require_text("name", "   ").unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category(Some(" Dessert ")), Some("Dessert".into()));
        assert_eq!(normalize_category(Some("  ")), None);
        assert_eq!(normalize_category(None), None);
    }
}
