//! Recipe entity definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    LogEntry, Rating, ValidationError,
    validation::{normalize_category, require_text},
};

/// Identifier of a recipe.
///
/// Document stores hand out opaque strings while the local store uses
/// millisecond timestamps; both are kept as text. Numeric ids found in older
/// local data are accepted and converted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    /// Wraps an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random document id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecipeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for RecipeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(id) => Self(id),
            Raw::Number(id) => Self(id.to_string()),
        })
    }
}

/// The signed-in person a record is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Stable account identifier.
    pub uid: String,
    /// Display name, if the account has one.
    pub display_name: Option<String>,
}

impl Author {
    /// Creates an author.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A cataloged recipe link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Unique identifier, immutable once assigned.
    pub id: RecipeId,
    /// Display name.
    pub name: String,
    /// Link to the recipe.
    pub url: String,
    /// Category; `None` means uncategorized.
    #[serde(default)]
    pub category: Option<String>,
    /// Whether the recipe has been cooked.
    #[serde(default)]
    pub cooked: bool,
    /// Star rating.
    #[serde(default)]
    pub rating: Rating,
    /// Cooking logs, newest first.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Account id of the creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Display name of the creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
}

impl Recipe {
    /// Finds a log entry by id.
    pub fn log(&self, log_id: crate::LogId) -> Option<&LogEntry> {
        self.logs.iter().find(|l| l.id == log_id)
    }
}

/// User supplied fields for a new recipe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecipeDraft {
    /// Display name.
    pub name: String,
    /// Link to the recipe.
    pub url: String,
    /// Category, blank for none.
    pub category: Option<String>,
}

impl RecipeDraft {
    /// Creates a draft.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            category: None,
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Validates the draft and turns it into an unsaved record.
    ///
    /// Name and url are trimmed and must not be empty; a blank category
    /// becomes `None`.
    pub fn validate(
        &self,
        created_at: DateTime<Utc>,
        author: Option<&Author>,
    ) -> Result<NewRecipe, ValidationError> {
        Ok(NewRecipe {
            name: require_text("name", &self.name)?,
            url: require_text("url", &self.url)?,
            category: normalize_category(self.category.as_deref()),
            created_at,
            created_by: author.map(|a| a.uid.clone()),
            created_by_name: author.and_then(|a| a.display_name.clone()),
        })
    }
}

/// A validated recipe that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    /// Display name.
    pub name: String,
    /// Link to the recipe.
    pub url: String,
    /// Normalized category.
    pub category: Option<String>,
    /// Client side creation time; backends may substitute their own.
    pub created_at: DateTime<Utc>,
    /// Account id of the creator.
    pub created_by: Option<String>,
    /// Display name of the creator.
    pub created_by_name: Option<String>,
}

impl NewRecipe {
    /// Assigns an id, producing a fresh uncooked, unrated recipe.
    pub fn into_recipe(self, id: RecipeId) -> Recipe {
        Recipe {
            id,
            name: self.name,
            url: self.url,
            category: self.category,
            cooked: false,
            rating: Rating::UNRATED,
            logs: Vec::new(),
            created_at: self.created_at,
            created_by: self.created_by,
            created_by_name: self.created_by_name,
        }
    }
}

/// A partial update. Fields left as `None` are not touched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecipePatch {
    /// New name.
    pub name: Option<String>,
    /// New url.
    pub url: Option<String>,
    /// New category; `Some(None)` clears it.
    pub category: Option<Option<String>>,
    /// New cooked flag.
    pub cooked: Option<bool>,
    /// New rating.
    pub rating: Option<Rating>,
    /// Replacement log list.
    pub logs: Option<Vec<LogEntry>>,
}

impl RecipePatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name, trimming it and rejecting blanks.
    pub fn with_name(mut self, name: &str) -> Result<Self, ValidationError> {
        self.name = Some(require_text("name", name)?);
        Ok(self)
    }

    /// Sets the url, trimming it and rejecting blanks.
    pub fn with_url(mut self, url: &str) -> Result<Self, ValidationError> {
        self.url = Some(require_text("url", url)?);
        Ok(self)
    }

    /// Sets or clears the category.
    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = Some(normalize_category(category));
        self
    }

    /// Sets the cooked flag.
    pub fn with_cooked(mut self, cooked: bool) -> Self {
        self.cooked = Some(cooked);
        self
    }

    /// Sets the rating.
    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Replaces the whole log list.
    pub fn with_logs(mut self, logs: Vec<LogEntry>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.category.is_none()
            && self.cooked.is_none()
            && self.rating.is_none()
            && self.logs.is_none()
    }

    /// Applies the supplied fields to a record.
    pub fn apply_to(&self, recipe: &mut Recipe) {
        if let Some(name) = &self.name {
            recipe.name = name.clone();
        }
        if let Some(url) = &self.url {
            recipe.url = url.clone();
        }
        if let Some(category) = &self.category {
            recipe.category = category.clone();
        }
        if let Some(cooked) = self.cooked {
            recipe.cooked = cooked;
        }
        if let Some(rating) = self.rating {
            recipe.rating = rating;
        }
        if let Some(logs) = &self.logs {
            recipe.logs = logs.clone();
        }
    }

    /// Names of the fields this patch carries, for logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.url.is_some() {
            fields.push("url");
        }
        if self.category.is_some() {
            fields.push("category");
        }
        if self.cooked.is_some() {
            fields.push("cooked");
        }
        if self.rating.is_some() {
            fields.push("rating");
        }
        if self.logs.is_some() {
            fields.push("logs");
        }
        fields
    }
}
