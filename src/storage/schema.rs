//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Series-Crawler database.
//! The layout matches databases written by earlier releases, so existing stores keep working.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Episodes that were downloaded completely
CREATE TABLE IF NOT EXISTS crawled_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    page_title TEXT,
    crawled_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

-- Small persisted settings (last target, download root, config hash)
CREATE TABLE IF NOT EXISTS app_config (
    key TEXT PRIMARY KEY,
    value TEXT
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
