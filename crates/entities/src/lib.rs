//! Core entity definitions for the recipe book.
//!
//! This crate defines the recipe and cooking log records shared by the
//! persistence gateways and the catalog, together with the drafts and patches
//! used to create and change them.

mod cooking_log;
mod rating;
mod recipe;
mod validation;

pub use cooking_log::*;
pub use rating::*;
pub use recipe::*;
pub use validation::*;
