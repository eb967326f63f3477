//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - The dedup record of finished episodes
//! - Small persisted settings
//! - Record listing and deletion for store maintenance

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DedupStore, Storage, StorageError, StorageResult};

use std::path::Path;

/// Settings keys persisted in `app_config`
pub mod keys {
    pub const LAST_TARGET_URL: &str = "last_target_url";
    pub const DOWNLOAD_ROOT: &str = "download_root";
    pub const WORKER_COUNT: &str = "worker_count";
    pub const CONFIG_HASH: &str = "config_hash";
}

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One finished episode in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRecord {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub crawled_at: Option<String>,
}
