//! Storage traits and error types
//!
//! `DedupStore` is the narrow interface the crawl engine consumes. `Storage` adds the
//! settings and maintenance operations used by the command line.

use crate::storage::DedupRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent record of finished items, keyed by URL
///
/// Implementations serialize their own access; callers hold no locks.
pub trait DedupStore: Send + Sync {
    /// Returns true if the URL was recorded by an earlier success
    fn exists(&self, url: &str) -> StorageResult<bool>;

    /// Records a finished URL
    ///
    /// Recording a URL that is already present is a silent no-op.
    fn record(&self, url: &str, title: &str) -> StorageResult<()>;
}

/// Full storage backend used by the command line
pub trait Storage: DedupStore {
    // ===== Settings =====

    /// Reads a persisted setting
    fn get_config(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes a persisted setting, replacing any previous value
    fn set_config(&self, key: &str, value: &str) -> StorageResult<()>;

    // ===== Maintenance =====

    /// Lists records newest first, optionally filtered by a title substring
    fn list_records(&self, title_filter: Option<&str>) -> StorageResult<Vec<DedupRecord>>;

    /// Deletes records by id and returns how many were removed
    fn delete_records(&self, ids: &[i64]) -> StorageResult<usize>;

    /// Counts all records
    fn count_records(&self) -> StorageResult<u64>;
}
