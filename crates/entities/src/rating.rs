//! Star rating entity definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A star rating in the inclusive range `0..=5`.
///
/// Zero means "not rated yet". Setting a rating always replaces the previous
/// value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Highest rating a recipe can have.
    pub const MAX: u8 = 5;

    /// The "not rated" value.
    pub const UNRATED: Rating = Rating(0);

    /// Creates a rating, rejecting values above [`Rating::MAX`].
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if value > Self::MAX {
            return Err(ValidationError::new(
                "rating",
                format!("must be between 0 and {}, got {}", Self::MAX, value),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the numeric value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Number of filled stars followed by the number of empty stars.
    pub fn stars(self) -> (u8, u8) {
        (self.0, Self::MAX - self.0)
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}
