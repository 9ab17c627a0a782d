//! Persistence gateways for the recipe book.
//!
//! This crate provides the storage abstraction the catalog talks to. It ships
//! a local backend that keeps the whole collection under a single key (SQLite
//! or in-memory storage) and a document store backend that pushes live
//! snapshots to subscribers.

mod error;
mod local;
mod memory;
mod sqlite;
mod traits;

pub use error::*;
pub use local::*;
pub use memory::*;
pub use sqlite::*;
pub use traits::*;
