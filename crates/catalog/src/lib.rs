//! Recipe catalog core.
//!
//! - [`RecipeCollectionStore`] owns the in-memory recipe collection and routes
//!   every mutation through a [`recipe_store::RecipeGateway`].
//! - [`project`] derives the sorted, filtered card list and aggregate counts.
//! - [`DetailEditor`] drives the single-recipe detail view: rating, cooked
//!   flag, field edits and cooking logs with photos.

mod collection;
mod editor;
mod error;
mod events;
mod photo;
mod projection;

pub use collection::*;
pub use editor::*;
pub use error::*;
pub use events::*;
pub use photo::*;
pub use projection::*;
