//! Content extraction from rendered documents
//!
//! This module turns serialized HTML into work items and page contents:
//! - Episode links from the series listing
//! - Episode title, with the site branding removed
//! - Image URLs inside the content section
//!
//! Everything here is pure parsing; no I/O happens in this module.

use crate::config::SiteConfig;
use crate::url::{resolve_href, url_extension};
use crate::{ConfigError, ConfigResult};
use rand::Rng;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Title and assets extracted from one episode page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,

    /// Assets in document order, excluded extensions removed
    pub assets: Vec<PageAsset>,

    /// False when the content section is absent from the document
    pub section_found: bool,
}

/// One image inside the content section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAsset {
    /// 1-based position among every `img` in the section, skipped ones included
    pub index: usize,
    pub url: String,
}

/// Compiled selectors for one site layout
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    listing_container: Selector,
    listing_links: Selector,
    title_selectors: Vec<Selector>,
    content_section: Selector,
    images: Selector,
    title_suffix: String,
    excluded_extensions: Vec<String>,
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

impl ContentExtractor {
    pub fn new(site: &SiteConfig) -> ConfigResult<Self> {
        Ok(Self {
            listing_container: compile(&site.listing_container)?,
            listing_links: compile(&site.listing_links)?,
            title_selectors: site
                .title_selectors
                .iter()
                .map(|s| compile(s))
                .collect::<Result<_, _>>()?,
            content_section: compile(&site.content_section)?,
            images: compile("img")?,
            title_suffix: site.title_suffix.clone(),
            excluded_extensions: site
                .excluded_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Collects the episode URLs linked from a series listing
    ///
    /// Links are resolved against `page_url`, de-duplicated and kept in document order.
    /// A listing without the container yields an empty list.
    pub fn resolve_listing(&self, html: &str, page_url: &Url) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for container in document.select(&self.listing_container) {
            for link in container.select(&self.listing_links) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                if let Some(url) = resolve_href(page_url, href) {
                    if seen.insert(url.clone()) {
                        items.push(url);
                    }
                }
            }
        }

        items
    }

    /// Extracts title and asset URLs from a rendered episode page
    pub fn extract_page(&self, html: &str, page_url: &Url) -> ExtractedPage {
        let document = Html::parse_document(html);
        let title = self
            .extract_title(&document)
            .unwrap_or_else(untitled_placeholder);

        let Some(section) = document.select(&self.content_section).next() else {
            return ExtractedPage {
                title,
                assets: Vec::new(),
                section_found: false,
            };
        };

        let assets = section
            .select(&self.images)
            .enumerate()
            .filter_map(|(i, img)| {
                let url = resolve_href(page_url, img.value().attr("src")?)?;
                Some(PageAsset { index: i + 1, url })
            })
            .filter(|asset| !self.is_excluded(&asset.url))
            .collect();

        ExtractedPage {
            title,
            assets,
            section_found: true,
        }
    }

    fn extract_title(&self, document: &Html) -> Option<String> {
        self.title_selectors.iter().find_map(|selector| {
            document
                .select(selector)
                .next()
                .map(|element| element.text().collect::<String>())
                .map(|text| self.strip_branding(&text))
                .filter(|s| !s.is_empty())
        })
    }

    fn strip_branding(&self, title: &str) -> String {
        let title = if self.title_suffix.is_empty() {
            title.to_string()
        } else {
            title.replace(&self.title_suffix, "")
        };
        title.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn is_excluded(&self, url: &str) -> bool {
        match url_extension(url) {
            Some(ext) => self.excluded_extensions.iter().any(|e| *e == ext),
            None => false,
        }
    }
}

/// Placeholder title for pages without a heading
fn untitled_placeholder() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..10000);
    format!("untitled_post_{}", suffix)
}

/// Names reserved by Windows that cannot be used as directory names
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Turns a title into a directory name
///
/// Keeps alphanumerics, spaces, `.` and `_`, trims leading and trailing spaces and dots,
/// and falls back to `untitled` when nothing remains.
///
/// # Examples
///
/// ```
/// use series_crawler::crawler::sanitize_title;
///
/// assert_eq!(sanitize_title("Chapter 12: The End?"), "Chapter 12 The End");
/// assert_eq!(sanitize_title(" ../ "), "untitled");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_'))
        .collect();
    let mut name = kept.trim_matches(&[' ', '.'][..]).to_string();

    if name.is_empty() {
        return "untitled".to_string();
    }
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(&name)) {
        name.push('_');
    }
    name
}
