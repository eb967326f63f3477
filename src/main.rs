//! Series-Crawler main entry point
//!
//! This is the command-line interface for the Series-Crawler episode downloader.

use anyhow::{bail, Context};
use clap::Parser;
use series_crawler::config::{load_config_with_hash, validate_worker_count, Config};
use series_crawler::crawler::{Orchestrator, RunParams};
use series_crawler::output::{
    load_statistics, print_records, print_report, print_statistics, ConsoleReporter,
};
use series_crawler::progress;
use series_crawler::renderer::ChromeRendererFactory;
use series_crawler::storage::{keys, SqliteStorage, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Series-Crawler: downloads every episode of a series
///
/// Series-Crawler resolves the episodes linked from a series listing page, renders each
/// one in its own browser session, saves the images and remembers finished episodes so
/// the next run only fetches what is new.
#[derive(Parser, Debug)]
#[command(name = "series-crawler")]
#[command(version = "1.0.0")]
#[command(about = "Resumable downloader for serialized galleries", long_about = None)]
struct Cli {
    /// Series listing URL; defaults to the last one crawled
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Directory that receives one folder per episode
    #[arg(long, value_name = "DIR")]
    download_root: Option<PathBuf>,

    /// Number of concurrent browser sessions (1-10)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the SQLite store
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Run browsers without a window
    #[arg(long)]
    headless: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// List recorded episodes, newest first, and exit
    #[arg(long, conflicts_with_all = ["delete", "stats"])]
    list: bool,

    /// Only list episodes whose title contains TERM
    #[arg(long, value_name = "TERM", requires = "list")]
    search: Option<String>,

    /// Delete recorded episodes by id and exit
    #[arg(long, value_name = "ID", num_args = 1.., conflicts_with_all = ["list", "stats"])]
    delete: Vec<i64>,

    /// Show statistics from the store and exit
    #[arg(long, conflicts_with_all = ["list", "delete"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_configuration(&cli)?;

    let database_path = Path::new(&config.output.database_path);
    let storage = Arc::new(
        SqliteStorage::new(database_path)
            .with_context(|| format!("opening store {}", database_path.display()))?,
    );

    if let Some(hash) = config_hash {
        track_config_hash(storage.as_ref(), &hash);
    }

    // Handle different modes
    if cli.stats {
        let stats = load_statistics(storage.as_ref())?;
        println!("Database: {}\n", config.output.database_path);
        print_statistics(&stats);
        return Ok(());
    }
    if cli.list {
        let records = storage.list_records(cli.search.as_deref())?;
        print_records(&records);
        return Ok(());
    }
    if !cli.delete.is_empty() {
        let deleted = storage.delete_records(&cli.delete)?;
        println!("Deleted {} of {} record(s)", deleted, cli.delete.len());
        return Ok(());
    }

    let target_url = match cli.url.clone() {
        Some(url) => url,
        None => match storage.get_config(keys::LAST_TARGET_URL)? {
            Some(url) => {
                tracing::info!("Resuming last target {}", url);
                url
            }
            None => bail!("no URL given and no previous target remembered"),
        },
    };

    handle_crawl(config, storage, target_url).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("series_crawler=info,warn"),
            1 => EnvFilter::new("series_crawler=debug,info"),
            2 => EnvFilter::new("series_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the optional config file and applies command-line overrides
fn load_configuration(cli: &Cli) -> anyhow::Result<(Config, Option<String>)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("loading {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    if let Some(workers) = cli.workers {
        validate_worker_count(workers)?;
        config.crawler.workers = workers;
    }
    if let Some(root) = &cli.download_root {
        config.output.download_root = root.to_string_lossy().into_owned();
    }
    if let Some(database) = &cli.database {
        config.output.database_path = database.to_string_lossy().into_owned();
    }
    if cli.headless {
        config.browser.headless = true;
    }

    Ok((config, hash))
}

/// Reports a configuration change since the previous run and stores the new hash
fn track_config_hash(storage: &dyn Storage, hash: &str) {
    match storage.get_config(keys::CONFIG_HASH) {
        Ok(Some(previous)) if previous != hash => {
            tracing::info!("Configuration changed since the last run");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Could not read stored config hash: {}", e),
    }
    if let Err(e) = storage.set_config(keys::CONFIG_HASH, hash) {
        tracing::warn!("Could not store config hash: {}", e);
    }
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    storage: Arc<SqliteStorage>,
    target_url: String,
) -> anyhow::Result<()> {
    let params = RunParams {
        target_url,
        download_root: PathBuf::from(&config.output.download_root),
        worker_count: config.crawler.workers,
    };
    tracing::info!(
        "Crawling {} with {} worker(s) into {}",
        params.target_url,
        params.worker_count,
        params.download_root.display()
    );

    let (tx, rx) = progress::channel(config.crawler.progress_capacity);
    let reporter = tokio::spawn(ConsoleReporter::new(rx).run());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let factory = Arc::new(ChromeRendererFactory::new(&config.browser));
    let orchestrator = Orchestrator::new(config, storage, factory, tx)?;
    let outcome = orchestrator.run(params, cancel).await;

    // Dropping the last sender lets the reporter finish
    drop(orchestrator);
    if let Err(e) = reporter.await {
        tracing::warn!("Console reporter ended abnormally: {}", e);
    }

    match outcome {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
