//! SQLite entry store for deferq.
//!
//! Provides persistent queue storage using SQLite.

mod backend;
mod schema;

pub use backend::SqliteEntryStore;
