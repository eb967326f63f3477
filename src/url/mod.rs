//! URL handling module for Series-Crawler
//!
//! This module provides target validation, origin extraction for referer headers,
//! link resolution against a base page, and extension lookup from URL paths.

mod origin;
mod resolve;

// Re-export main functions
pub use origin::{parse_target, referer_for};
pub use resolve::{resolve_href, url_extension};
