//! Detail view and cooking log editing for a single recipe.
//!
//! The editor is an explicit state machine:
//!
//! ```text
//! Closed -> Viewing -> {EditingFields | AddingLog} -> Viewing -> Closed
//! ```
//!
//! Opening a recipe always lands in `Viewing` and discards any pending edit
//! buffer, log form or photo. Closing from any state discards them too.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use entities::{LogDraft, LogEntry, LogId, Rating, Recipe, RecipeId, RecipePatch};
use serde::Serialize;

use crate::{CatalogError, CatalogResult, PhotoEncoder, RecipeCollectionStore};

/// Label shown for recipes without a category.
pub const UNCATEGORIZED_LABEL: &str = "未分類";

/// Renders a log date as `YYYY年M月D日`.
pub fn format_log_date(date: NaiveDate) -> String {
    format!("{}年{}月{}日", date.year(), date.month(), date.day())
}

/// Category picked in the edit form: nothing, one of the known categories, or
/// freshly typed text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryChoice {
    #[default]
    None,
    Existing(String),
    New(String),
}

impl CategoryChoice {
    /// Pre-selects `category`: an existing entry when it is already known,
    /// typed text otherwise.
    pub fn for_category(category: Option<&str>, known: &[String]) -> Self {
        match category {
            Some(c) if known.iter().any(|k| k == c) => Self::Existing(c.to_string()),
            Some(c) => Self::New(c.to_string()),
            None => Self::None,
        }
    }

    /// The category to store. Blank text resolves to none.
    pub fn resolve(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Existing(c) | Self::New(c) => entities::normalize_category(Some(c)),
        }
    }
}

/// Buffered field values while editing a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    pub name: String,
    pub url: String,
    pub category: CategoryChoice,
}

impl EditBuffer {
    fn from_recipe(recipe: &Recipe, known: &[String]) -> Self {
        Self {
            name: recipe.name.clone(),
            url: recipe.url.clone(),
            category: CategoryChoice::for_category(recipe.category.as_deref(), known),
        }
    }

    fn to_patch(&self) -> CatalogResult<RecipePatch> {
        Ok(RecipePatch::new()
            .with_name(&self.name)?
            .with_url(&self.url)?
            .with_category(self.category.resolve().as_deref()))
    }
}

/// A cooking log being filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogForm {
    pub date: NaiveDate,
    pub note: String,
    pending_photo: Option<String>,
}

impl LogForm {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            note: String::new(),
            pending_photo: None,
        }
    }

    /// The encoded photo waiting to be attached, if any.
    pub fn pending_photo(&self) -> Option<&str> {
        self.pending_photo.as_deref()
    }

    fn to_draft(&self, photo: Option<String>) -> LogDraft {
        let draft = LogDraft::new(self.date).with_note(&self.note);
        match photo {
            Some(photo) => draft.with_photo(photo),
            None => draft,
        }
    }
}

/// Where the detail editor currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetailState {
    #[default]
    Closed,
    Viewing {
        recipe_id: RecipeId,
    },
    EditingFields {
        recipe_id: RecipeId,
        buffer: EditBuffer,
    },
    AddingLog {
        recipe_id: RecipeId,
        form: LogForm,
    },
}

impl DetailState {
    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Viewing { .. } => "viewing",
            Self::EditingFields { .. } => "editing",
            Self::AddingLog { .. } => "adding a log",
        }
    }

    /// The recipe the editor is open on.
    pub fn recipe_id(&self) -> Option<&RecipeId> {
        match self {
            Self::Closed => None,
            Self::Viewing { recipe_id }
            | Self::EditingFields { recipe_id, .. }
            | Self::AddingLog { recipe_id, .. } => Some(recipe_id),
        }
    }
}

/// A cooking log entry prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogView {
    pub id: LogId,
    pub date: NaiveDate,
    pub date_label: String,
    pub note: Option<String>,
    pub photo: Option<String>,
    pub created_by: Option<String>,
}

impl From<&LogEntry> for LogView {
    fn from(entry: &LogEntry) -> Self {
        Self {
            id: entry.id,
            date: entry.date,
            date_label: format_log_date(entry.date),
            note: entry.note.clone(),
            photo: entry.photo.clone(),
            created_by: entry.created_by.clone(),
        }
    }
}

/// Everything the detail view shows for one recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDetail {
    pub id: RecipeId,
    pub name: String,
    pub url: String,
    pub category: Option<String>,
    pub category_label: String,
    pub author: Option<String>,
    pub rating: Rating,
    pub cooked: bool,
    pub logs: Vec<LogView>,
}

impl From<&Recipe> for RecipeDetail {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            url: recipe.url.clone(),
            category: recipe.category.clone(),
            category_label: recipe
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED_LABEL.to_string()),
            author: recipe.created_by_name.clone(),
            rating: recipe.rating,
            cooked: recipe.cooked,
            logs: recipe.logs.iter().map(LogView::from).collect(),
        }
    }
}

/// Drives the detail view of one recipe at a time.
pub struct DetailEditor {
    store: Arc<RecipeCollectionStore>,
    encoder: Arc<dyn PhotoEncoder>,
    state: DetailState,
}

impl DetailEditor {
    pub fn new(store: Arc<RecipeCollectionStore>, encoder: Arc<dyn PhotoEncoder>) -> Self {
        Self {
            store,
            encoder,
            state: DetailState::Closed,
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    /// Opens the detail view, discarding whatever was pending. If the recipe
    /// cannot be found the view ends up closed.
    pub async fn open(&mut self, recipe_id: &RecipeId) -> CatalogResult<RecipeDetail> {
        self.state = DetailState::Closed;
        let recipe = self.load(recipe_id).await?;
        self.state = DetailState::Viewing {
            recipe_id: recipe_id.clone(),
        };
        tracing::debug!(recipe_id = %recipe_id, "Opened recipe detail");
        Ok(RecipeDetail::from(&recipe))
    }

    /// Closes the view. Unsaved buffers are dropped.
    pub fn close(&mut self) {
        if let Some(recipe_id) = self.state.recipe_id() {
            tracing::debug!(recipe_id = %recipe_id, "Closed recipe detail");
        }
        self.state = DetailState::Closed;
    }

    /// Current detail of the open recipe, as the collection has it now.
    pub async fn detail(&self) -> CatalogResult<RecipeDetail> {
        let recipe_id = self.open_recipe_id()?;
        let recipe = self.load(recipe_id).await?;
        Ok(RecipeDetail::from(&recipe))
    }

    // =========================================================================
    // Rating and cooked flag
    // =========================================================================

    /// Applies a clicked star rating (1 to 5) to the open recipe.
    pub async fn select_rating(&self, stars: u8) -> CatalogResult<RecipeDetail> {
        let recipe_id = self.open_recipe_id()?;
        if !(1..=Rating::MAX).contains(&stars) {
            return Err(CatalogError::validation(
                "rating",
                format!("must be between 1 and {}", Rating::MAX),
            ));
        }
        let recipe = self.store.set_rating(recipe_id, stars).await?;
        Ok(RecipeDetail::from(&recipe))
    }

    /// Sets the cooked flag of the open recipe.
    pub async fn set_cooked(&self, cooked: bool) -> CatalogResult<RecipeDetail> {
        let recipe_id = self.open_recipe_id()?;
        let recipe = self.store.set_cooked(recipe_id, cooked).await?;
        Ok(RecipeDetail::from(&recipe))
    }

    // =========================================================================
    // Field editing
    // =========================================================================

    /// Enters edit mode with the buffer pre-filled from the recipe.
    pub async fn begin_edit(&mut self) -> CatalogResult<&mut EditBuffer> {
        let recipe_id = self.viewing_recipe_id()?.clone();
        let recipe = self.load(&recipe_id).await?;
        let categories = self.store.categories().await;

        self.state = DetailState::EditingFields {
            recipe_id,
            buffer: EditBuffer::from_recipe(&recipe, &categories),
        };
        self.edit_buffer_mut()
    }

    /// The edit buffer, while editing.
    pub fn edit_buffer_mut(&mut self) -> CatalogResult<&mut EditBuffer> {
        let actual = self.state.name();
        match &mut self.state {
            DetailState::EditingFields { buffer, .. } => Ok(buffer),
            _ => Err(CatalogError::InvalidState {
                expected: "editing",
                actual,
            }),
        }
    }

    /// Leaves edit mode without saving.
    pub fn cancel_edit(&mut self) -> CatalogResult<()> {
        match &self.state {
            DetailState::EditingFields { recipe_id, .. } => {
                self.state = DetailState::Viewing {
                    recipe_id: recipe_id.clone(),
                };
                Ok(())
            }
            other => Err(CatalogError::InvalidState {
                expected: "editing",
                actual: other.name(),
            }),
        }
    }

    /// Validates and saves the edit buffer, then returns to viewing.
    ///
    /// The returned detail already reflects the saved fields. On failure the
    /// editor stays in edit mode with the buffer intact.
    pub async fn save_edit(&mut self) -> CatalogResult<RecipeDetail> {
        let DetailState::EditingFields { recipe_id, buffer } = &self.state else {
            return Err(CatalogError::InvalidState {
                expected: "editing",
                actual: self.state.name(),
            });
        };
        let recipe_id = recipe_id.clone();
        let patch = buffer.to_patch()?;

        let recipe = self.store.update(&recipe_id, patch).await?;
        self.state = DetailState::Viewing { recipe_id };
        Ok(RecipeDetail::from(&recipe))
    }

    // =========================================================================
    // Cooking logs
    // =========================================================================

    /// Opens the log form dated today.
    pub fn begin_log(&mut self) -> CatalogResult<&mut LogForm> {
        self.begin_log_on(Utc::now().date_naive())
    }

    /// Opens the log form for a given date.
    pub fn begin_log_on(&mut self, date: NaiveDate) -> CatalogResult<&mut LogForm> {
        let recipe_id = self.viewing_recipe_id()?.clone();
        self.state = DetailState::AddingLog {
            recipe_id,
            form: LogForm::new(date),
        };
        self.log_form_mut()
    }

    /// The log form, while adding a log.
    pub fn log_form_mut(&mut self) -> CatalogResult<&mut LogForm> {
        let actual = self.state.name();
        match &mut self.state {
            DetailState::AddingLog { form, .. } => Ok(form),
            _ => Err(CatalogError::InvalidState {
                expected: "adding a log",
                actual,
            }),
        }
    }

    /// Encodes a photo and holds it for the log being written. Any previously
    /// held photo is dropped first, even if encoding fails.
    pub fn attach_photo(&mut self, raw: &[u8]) -> CatalogResult<&str> {
        let encoder = Arc::clone(&self.encoder);
        let form = self.log_form_mut()?;
        form.pending_photo = None;

        let encoded = encoder.encode(raw).map_err(|e| {
            tracing::warn!(error = %e, "Failed to encode photo");
            CatalogError::from(e)
        })?;
        Ok(form.pending_photo.insert(encoded).as_str())
    }

    /// Drops the held photo.
    pub fn clear_photo(&mut self) -> CatalogResult<()> {
        self.log_form_mut()?.pending_photo = None;
        Ok(())
    }

    /// Leaves the log form without saving.
    pub fn cancel_log(&mut self) -> CatalogResult<()> {
        match &self.state {
            DetailState::AddingLog { recipe_id, .. } => {
                self.state = DetailState::Viewing {
                    recipe_id: recipe_id.clone(),
                };
                Ok(())
            }
            other => Err(CatalogError::InvalidState {
                expected: "adding a log",
                actual: other.name(),
            }),
        }
    }

    /// Saves the log form with the held photo, if any.
    ///
    /// The held photo is released whether or not the write succeeds. On
    /// success the editor returns to viewing; on failure the form stays open.
    pub async fn submit_log(&mut self) -> CatalogResult<LogEntry> {
        let actual = self.state.name();
        let DetailState::AddingLog { recipe_id, form } = &mut self.state else {
            return Err(CatalogError::InvalidState {
                expected: "adding a log",
                actual,
            });
        };
        let recipe_id = recipe_id.clone();
        let photo = form.pending_photo.take();
        let draft = form.to_draft(photo);

        let entry = self.store.add_log(&recipe_id, draft).await?;
        self.state = DetailState::Viewing { recipe_id };
        Ok(entry)
    }

    /// Removes a log entry from the open recipe.
    pub async fn delete_log(&self, log_id: LogId) -> CatalogResult<()> {
        let recipe_id = self.open_recipe_id()?;
        self.store.delete_log(recipe_id, log_id).await
    }

    fn open_recipe_id(&self) -> CatalogResult<&RecipeId> {
        self.state.recipe_id().ok_or(CatalogError::InvalidState {
            expected: "open",
            actual: "closed",
        })
    }

    fn viewing_recipe_id(&self) -> CatalogResult<&RecipeId> {
        match &self.state {
            DetailState::Viewing { recipe_id } => Ok(recipe_id),
            other => Err(CatalogError::InvalidState {
                expected: "viewing",
                actual: other.name(),
            }),
        }
    }

    async fn load(&self, recipe_id: &RecipeId) -> CatalogResult<Recipe> {
        self.store.get(recipe_id).await.ok_or_else(|| {
            tracing::warn!(recipe_id = %recipe_id, "Recipe not in collection");
            CatalogError::not_found("Recipe", recipe_id)
        })
    }
}

impl std::fmt::Debug for DetailEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailEditor")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
