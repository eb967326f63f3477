//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ItemState`: lifecycle of a single item inside its worker
//! - `CrawlResult`: the outcome a worker reports for one item
//! - `ProgressState`: run-wide counters owned by the orchestrator

mod crawl_result;
mod item_state;
mod progress_state;

// Re-export main types
pub use crawl_result::{CrawlResult, ResultState};
pub use item_state::ItemState;
pub use progress_state::ProgressState;
