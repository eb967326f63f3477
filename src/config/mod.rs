//! Configuration module for Series-Crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration file is optional; every key has a default.
//!
//! # Example
//!
//! ```no_run
//! use series_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrowserConfig, Config, CrawlerConfig, FetchConfig, OutputConfig, SiteConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{
    validate, validate_worker_count, MAX_WORKERS, MIN_WORKERS, RECOMMENDED_MAX_WORKERS,
};
