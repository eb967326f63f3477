//! Output module for presenting crawl progress and store contents
//!
//! This module handles:
//! - Draining the progress channel to the console at a fixed cadence
//! - Printing the final run report
//! - Listing, searching and summarizing the dedup store

mod console;
pub mod stats;

pub use console::{print_report, ConsoleReporter, DEFAULT_DRAIN_INTERVAL};
pub use stats::{load_statistics, print_records, print_statistics, StoreStatistics};
