//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DedupStore, Storage, StorageError, StorageResult};
use crate::storage::DedupRecord;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Timestamp layout compatible with SQLite's CURRENT_TIMESTAMP
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite storage backend
///
/// The connection sits behind a mutex so one store can be shared by every worker.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }
}

impl DedupStore for SqliteStorage {
    fn exists(&self, url: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM crawled_urls WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn record(&self, url: &str, title: &str) -> StorageResult<()> {
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO crawled_urls (url, page_title, crawled_at) VALUES (?1, ?2, ?3)",
            params![url, title, now],
        )?;

        if inserted == 0 {
            tracing::debug!("Already recorded: {}", url);
        } else {
            tracing::debug!("Recorded: {}", url);
        }
        Ok(())
    }
}

impl Storage for SqliteStorage {
    // ===== Settings =====

    fn get_config(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.conn()?;
        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT value FROM app_config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn set_config(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO app_config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // ===== Maintenance =====

    fn list_records(&self, title_filter: Option<&str>) -> StorageResult<Vec<DedupRecord>> {
        let conn = self.conn()?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(DedupRecord {
                id: row.get(0)?,
                url: row.get(1)?,
                title: row.get(2)?,
                crawled_at: row.get(3)?,
            })
        };

        let records = match title_filter.filter(|f| !f.is_empty()) {
            Some(filter) => {
                let mut stmt = conn.prepare(
                    "SELECT id, url, page_title, crawled_at FROM crawled_urls
                     WHERE page_title LIKE '%' || ?1 || '%' ORDER BY id DESC",
                )?;
                let rows = stmt.query_map(params![filter], map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, url, page_title, crawled_at FROM crawled_urls ORDER BY id DESC",
                )?;
                let rows = stmt.query_map([], map_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(records)
    }

    fn delete_records(&self, ids: &[i64]) -> StorageResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("DELETE FROM crawled_urls WHERE id IN ({})", placeholders);

        let conn = self.conn()?;
        let deleted = conn.execute(&sql, params_from_iter(ids.iter()))?;
        tracing::info!("Deleted {} record(s) from the store", deleted);
        Ok(deleted)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM crawled_urls", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
