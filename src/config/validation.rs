use crate::config::types::{Config, CrawlerConfig, OutputConfig, SiteConfig};
use crate::{ConfigError, ConfigResult};
use scraper::Selector;

/// Hard bounds for the worker pool size
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 10;

/// Beyond this many concurrent sessions the target site starts blocking
pub const RECOMMENDED_MAX_WORKERS: usize = 3;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;

    if config.fetch.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch timeout-secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates a worker count coming from the config file or the command line
pub fn validate_worker_count(workers: usize) -> ConfigResult<()> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
        return Err(ConfigError::Validation(format!(
            "workers must be between {} and {}, got {}",
            MIN_WORKERS, MAX_WORKERS, workers
        )));
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    validate_worker_count(config.workers)?;

    if config.content_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "content-timeout-secs must be > 0".to_string(),
        ));
    }

    if config.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout-secs must be > 0".to_string(),
        ));
    }

    // A zero poll interval would spin on the renderer
    if config.gate_poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "gate-poll-interval-ms must be > 0".to_string(),
        ));
    }

    if config.gate_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "gate-timeout-secs must be > 0 when set".to_string(),
        ));
    }

    if config.item_delay_min_ms > config.item_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "item-delay-min-ms ({}) must not exceed item-delay-max-ms ({})",
            config.item_delay_min_ms, config.item_delay_max_ms
        )));
    }

    if config.progress_capacity == 0 {
        return Err(ConfigError::Validation(
            "progress-capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every selector in the site description compiles
fn validate_site_config(config: &SiteConfig) -> ConfigResult<()> {
    validate_selector(&config.content_marker)?;
    validate_selector(&config.listing_container)?;
    validate_selector(&config.listing_links)?;
    validate_selector(&config.content_section)?;

    if config.title_selectors.is_empty() {
        return Err(ConfigError::Validation(
            "title-selectors cannot be empty".to_string(),
        ));
    }
    for selector in &config.title_selectors {
        validate_selector(selector)?;
    }

    if config.gate_marker.is_empty() {
        return Err(ConfigError::Validation(
            "gate-marker cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.download_root.is_empty() {
        return Err(ConfigError::Validation(
            "download-root cannot be empty".to_string(),
        ));
    }

    if config.listing_file_name.is_empty() || config.listing_file_name.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "listing-file-name must be a plain file name, got '{}'",
            config.listing_file_name
        )));
    }

    Ok(())
}

fn validate_selector(selector: &str) -> ConfigResult<()> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        })
}
