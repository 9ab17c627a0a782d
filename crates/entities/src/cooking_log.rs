//! Cooking log entity definitions.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::optional_text;

/// Identifier of a cooking log entry, derived from a millisecond timestamp.
pub type LogId = i64;

/// A dated record of having cooked a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unique identifier within the owning recipe.
    pub id: LogId,
    /// Calendar date the recipe was cooked.
    pub date: NaiveDate,
    /// Free text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Encoded photo, embeddable directly as an image source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Display name of whoever wrote the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl LogEntry {
    /// Builds an entry from a draft.
    pub fn from_draft(id: LogId, draft: LogDraft, created_by: Option<String>) -> Self {
        Self {
            id,
            date: draft.date,
            note: draft.note,
            photo: draft.photo,
            created_by,
        }
    }
}

/// User supplied fields for a new cooking log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogDraft {
    /// Calendar date the recipe was cooked.
    pub date: NaiveDate,
    /// Free text note; blank notes are dropped.
    pub note: Option<String>,
    /// Encoded photo.
    pub photo: Option<String>,
}

impl LogDraft {
    /// Creates a draft for the given date.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            note: None,
            photo: None,
        }
    }

    /// Creates a draft dated today (UTC).
    pub fn today() -> Self {
        Self::new(Utc::now().date_naive())
    }

    /// Sets the note. Whitespace-only notes are treated as absent.
    pub fn with_note(mut self, note: impl AsRef<str>) -> Self {
        self.note = optional_text(Some(note.as_ref()));
        self
    }

    /// Sets the encoded photo.
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());
        self
    }
}

/// Picks a fresh log id from the current time, bumped past every id already
/// present so ids stay unique within a recipe.
pub fn next_log_id(existing: &[LogEntry]) -> LogId {
    let now = Utc::now().timestamp_millis();
    match existing.iter().map(|l| l.id).max() {
        Some(max) if max >= now => max + 1,
        _ => now,
    }
}
