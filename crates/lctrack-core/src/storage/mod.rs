//! Storage Module
//!
//! SQLite-based storage layer with:
//! - Problems and their cached SM-2 state
//! - The entry history the state is replayed from
//! - Transactional record / remove / rebuild operations
//! - Versioned schema migrations

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{EntryRemoval, RebuildReport, Result, Storage, StorageError};
