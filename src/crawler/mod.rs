//! Crawler module for the crawl engine
//!
//! This module contains the core crawling logic, including:
//! - Listing and page extraction
//! - Round-robin partitioning of work items
//! - Per-worker page state machine
//! - Asset downloads
//! - Overall run orchestration

mod extractor;
mod fetcher;
mod orchestrator;
mod partition;
mod worker;

pub use extractor::{sanitize_title, ContentExtractor, ExtractedPage, PageAsset};
pub use fetcher::{build_http_client, resolve_extension, AssetError, AssetFetcher, DEFAULT_EXTENSION};
pub use orchestrator::{Orchestrator, RunParams, RunReport, RunStatus};
pub use partition::partition;
pub use worker::{CrawlWorker, ItemError, WorkerContext};
