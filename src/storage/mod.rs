//! Storage module for persisting crawl jobs and page results
//!
//! This module handles:
//! - The `ResultsStore` contract used by the job controller
//! - SQLite database initialization and schema management
//! - An in-memory store for tests and embedding

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{JobRecord, ResultsStore, StorageError, StorageResult};

use std::path::Path;

/// Opens (creating if needed) the results database at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}
