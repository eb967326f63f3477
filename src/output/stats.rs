//! Statistics and listings from the dedup store
//!
//! This module provides functionality for inspecting what earlier runs
//! have recorded.

use crate::storage::{DedupRecord, Storage};
use crate::CrawlerError;

/// Store statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Number of recorded episodes
    pub total_records: u64,

    /// Timestamp of the newest record
    pub last_crawled_at: Option<String>,

    /// Target of the most recent run
    pub last_target_url: Option<String>,

    /// Download root of the most recent run
    pub download_root: Option<String>,

    /// Hash of the configuration file used last
    pub config_hash: Option<String>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(CrawlerError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<StoreStatistics, CrawlerError> {
    use crate::storage::keys;

    let total_records = storage.count_records()?;
    let last_crawled_at = storage
        .list_records(None)?
        .into_iter()
        .find_map(|record| record.crawled_at);

    Ok(StoreStatistics {
        total_records,
        last_crawled_at,
        last_target_url: storage.get_config(keys::LAST_TARGET_URL)?,
        download_root: storage.get_config(keys::DOWNLOAD_ROOT)?,
        config_hash: storage.get_config(keys::CONFIG_HASH)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    let or_none = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("=== Store Statistics ===\n");
    println!("Recorded episodes: {}", stats.total_records);
    println!("Last crawled at:   {}", or_none(&stats.last_crawled_at));
    println!();
    println!("Last run:");
    println!("  Target URL:    {}", or_none(&stats.last_target_url));
    println!("  Download root: {}", or_none(&stats.download_root));
    println!("  Config hash:   {}", or_none(&stats.config_hash));
}

/// Prints store records, newest first
pub fn print_records(records: &[DedupRecord]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }

    println!("{:>6}  {:<19}  {:<40}  URL", "ID", "CRAWLED AT", "TITLE");
    for record in records {
        println!(
            "{:>6}  {:<19}  {:<40}  {}",
            record.id,
            record.crawled_at.as_deref().unwrap_or("-"),
            truncate(record.title.as_deref().unwrap_or(""), 40),
            record.url
        );
    }
    println!("\n{} record(s)", records.len());
}

/// Shortens `text` to at most `max` characters, marking the cut with an ellipsis
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
