use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Series-Crawler
///
/// Every section is optional in the TOML file; missing keys fall back to the
/// values the crawler was tuned with against the target site.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    pub fetch: FetchConfig,
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// Worker pool and per-item pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent worker slots (1..=10)
    pub workers: usize,

    /// Startup offset per slot, multiplied by the slot id (milliseconds)
    pub stagger_interval_ms: u64,

    /// Upper bound for a single page navigation (seconds)
    pub navigation_timeout_secs: u64,

    /// Upper bound for the content marker to appear (seconds)
    pub content_timeout_secs: u64,

    /// Poll interval while an interstitial gate is showing (milliseconds)
    pub gate_poll_interval_ms: u64,

    /// Pause after a gate was resolved (milliseconds)
    pub gate_settle_ms: u64,

    /// Give up on an unresolved gate after this long; unset waits forever
    pub gate_timeout_secs: Option<u64>,

    /// Maximum number of page-down steps per item
    pub max_scrolls: u32,

    /// Pause between page-down steps (milliseconds)
    pub scroll_delay_ms: u64,

    /// Pause after scrolling finished so lazy images can settle (milliseconds)
    pub scroll_settle_ms: u64,

    /// Lower bound of the randomized pause between items (milliseconds)
    pub item_delay_min_ms: u64,

    /// Upper bound of the randomized pause between items (milliseconds)
    pub item_delay_max_ms: u64,

    /// How long stopped workers may take to hand back their results (milliseconds)
    pub shutdown_grace_ms: u64,

    /// Capacity of the progress channel
    pub progress_capacity: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            stagger_interval_ms: 5_000,
            navigation_timeout_secs: 60,
            content_timeout_secs: 30,
            gate_poll_interval_ms: 5_000,
            gate_settle_ms: 2_000,
            gate_timeout_secs: None,
            max_scrolls: 500,
            scroll_delay_ms: 200,
            scroll_settle_ms: 2_000,
            item_delay_min_ms: 1_000,
            item_delay_max_ms: 3_000,
            shutdown_grace_ms: 10_000,
            progress_capacity: 1024,
        }
    }
}

impl CrawlerConfig {
    pub fn stagger_interval(&self) -> Duration {
        Duration::from_millis(self.stagger_interval_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }

    pub fn gate_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gate_poll_interval_ms)
    }

    pub fn gate_settle(&self) -> Duration {
        Duration::from_millis(self.gate_settle_ms)
    }

    pub fn gate_timeout(&self) -> Option<Duration> {
        self.gate_timeout_secs.map(Duration::from_secs)
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Selectors and markers describing the target site's markup
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Element whose presence means the real page body has rendered
    pub content_marker: String,

    /// Container holding the episode list on the listing page
    pub listing_container: String,

    /// Episode links, relative to the listing container
    pub listing_links: String,

    /// Title candidates, tried in order
    pub title_selectors: Vec<String>,

    /// Site branding appended to titles
    pub title_suffix: String,

    /// Section holding the episode images
    pub content_section: String,

    /// Image URLs containing any of these are skipped
    pub excluded_extensions: Vec<String>,

    /// Location fragment identifying the verification gate
    pub gate_marker: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_marker: "article[itemprop='articleBody']".to_string(),
            listing_container: "article[itemprop='articleBody'] div.serial-list".to_string(),
            listing_links: "a[href]".to_string(),
            title_selectors: vec!["h1".to_string(), "div.view-title".to_string()],
            title_suffix: " > 마나토끼 - 일본만화 허브".to_string(),
            content_section: "section[itemtype='http://schema.org/NewsArticle']".to_string(),
            excluded_extensions: vec![".gif".to_string()],
            gate_marker: "bbs/captcha.php".to_string(),
        }
    }
}

/// Asset download settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Per-asset request timeout (seconds)
    pub timeout_secs: u64,

    /// User agent sent with asset requests
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("series-crawler/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Run Chrome without a window. Interstitial gates need a visible window.
    pub headless: bool,

    /// Explicit Chrome/Chromium binary
    pub executable: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Root directory for downloaded episodes
    pub download_root: String,

    /// Sidecar file recording the listing URL in the download root
    pub listing_file_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "crawled_pages.db".to_string(),
            download_root: "download_mana".to_string(),
            listing_file_name: "list_url.txt".to_string(),
        }
    }
}
