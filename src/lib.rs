//! Series-Crawler: a resumable crawler for serialized galleries
//!
//! This crate resolves every episode linked from a series listing page, renders each episode in
//! its own browser session, downloads the embedded images and remembers finished episodes in a
//! SQLite store so that later runs only fetch what is new.

pub mod config;
pub mod crawler;
pub mod output;
pub mod progress;
pub mod renderer;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Series-Crawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Renderer error: {0}")]
    Renderer(#[from] renderer::RendererError),

    #[error("Failed to launch a renderer session for {context}: {source}")]
    SessionLaunch {
        context: String,
        source: renderer::RendererError,
    },

    #[error("Failed to resolve listing {url}: {message}")]
    ListingResolution { url: String, message: String },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid worker count: {0}")]
    InvalidWorkerCount(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Series-Crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{partition, Orchestrator, RunParams, RunReport, RunStatus};
pub use progress::{ProgressEvent, ProgressReceiver, ProgressSender};
pub use state::{CrawlResult, ItemState, ProgressState, ResultState};
pub use storage::{DedupStore, SqliteStorage};
