//! Crawl worker
//!
//! A worker owns one renderer session for its whole lifetime and drives each assigned
//! item through the page state machine:
//! dedup check → navigate → wait for content → gate wait → scroll → extract → fetch assets.
//!
//! Every per-item error is turned into a [`CrawlResult`] at the item boundary. Only a
//! failure to launch the session escapes the worker.

use crate::config::Config;
use crate::crawler::extractor::{sanitize_title, ContentExtractor};
use crate::crawler::fetcher::AssetFetcher;
use crate::progress::ProgressSender;
use crate::renderer::{
    wait_for_element, Renderer, RendererError, RendererFactory, SessionGuard,
};
use crate::state::{CrawlResult, ItemState};
use crate::storage::{DedupStore, StorageError};
use crate::CrawlerError;
use rand::Rng;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How often the content marker is polled while waiting
const CONTENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reasons an item stops before it succeeds
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("cancelled")]
    Cancelled,

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("content did not appear within {0:?}")]
    ContentTimeout(Duration),

    #[error("verification gate not cleared within {0:?}")]
    GateTimeout(Duration),

    #[error("renderer: {0}")]
    Renderer(#[from] RendererError),

    #[error("store: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid page URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How an item ended when no error occurred
#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemOutcome {
    Success { title: String, message: String },
    Skipped { title: String, reason: String },
}

/// Everything a worker shares with the rest of the run
pub struct WorkerContext<S: ?Sized> {
    pub config: Arc<Config>,
    pub extractor: Arc<ContentExtractor>,
    pub fetcher: AssetFetcher,
    pub store: Arc<S>,
    pub factory: Arc<dyn RendererFactory>,
    pub progress: ProgressSender,
    pub cancel: CancellationToken,
    pub download_root: PathBuf,
    pub referer: String,
}

impl<S: ?Sized> Clone for WorkerContext<S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            extractor: Arc::clone(&self.extractor),
            fetcher: self.fetcher.clone(),
            store: Arc::clone(&self.store),
            factory: Arc::clone(&self.factory),
            progress: self.progress.clone(),
            cancel: self.cancel.clone(),
            download_root: self.download_root.clone(),
            referer: self.referer.clone(),
        }
    }
}

/// One worker slot
pub struct CrawlWorker<S: ?Sized> {
    /// 1-based slot id
    id: usize,
    ctx: WorkerContext<S>,
}

impl<S: DedupStore + ?Sized> CrawlWorker<S> {
    pub fn new(id: usize, ctx: WorkerContext<S>) -> Self {
        Self { id, ctx }
    }

    /// Processes `items` in order and returns one result per item that was started
    ///
    /// Items not started because of cancellation produce no result.
    pub async fn run(self, items: Vec<String>) -> Result<Vec<CrawlResult>, CrawlerError> {
        let mut results = Vec::with_capacity(items.len());
        if items.is_empty() {
            return Ok(results);
        }

        let stagger = self.ctx.config.crawler.stagger_interval() * self.id as u32;
        if self.pause(stagger).await.is_err() {
            tracing::debug!("Worker {} cancelled before start", self.id);
            return Ok(results);
        }

        let label = format!("worker {}", self.id);
        let session = self
            .ctx
            .factory
            .launch()
            .await
            .map_err(|source| CrawlerError::SessionLaunch {
                context: label.clone(),
                source,
            })?;
        let mut guard = SessionGuard::new(session, label);
        self.ctx.progress.log(format!(
            "Worker {}: started with {} item(s)",
            self.id,
            items.len()
        ));

        for (i, url) in items.iter().enumerate() {
            if self.ctx.cancel.is_cancelled() {
                break;
            }

            let result = match guard.session() {
                Ok(session) => self.crawl_item(session, url).await,
                Err(e) => CrawlResult::fail(url.as_str(), "", e.to_string()),
            };
            self.report(&result);
            results.push(result);

            let more = i + 1 < items.len();
            if more && self.pause(self.item_delay()).await.is_err() {
                break;
            }
        }

        guard.release().await;
        self.ctx
            .progress
            .log(format!("Worker {}: finished", self.id));
        Ok(results)
    }

    async fn crawl_item(&self, session: &mut dyn Renderer, url: &str) -> CrawlResult {
        let mut state = ItemState::Pending;

        match self.process_item(session, url, &mut state).await {
            Ok(ItemOutcome::Success { title, message }) => {
                self.advance(url, &mut state, ItemState::Succeeded);
                CrawlResult::success(url, title, message)
            }
            Ok(ItemOutcome::Skipped { title, reason }) => {
                self.advance(url, &mut state, ItemState::Skipped);
                CrawlResult::skipped(url, title, reason)
            }
            Err(ItemError::Cancelled) => {
                self.advance(url, &mut state, ItemState::Skipped);
                CrawlResult::skipped(url, "", ItemError::Cancelled.to_string())
            }
            Err(e) => {
                tracing::debug!("Worker {}: {} failed while {}", self.id, url, state);
                self.advance(url, &mut state, ItemState::Failed);
                CrawlResult::fail(url, "", e.to_string())
            }
        }
    }

    async fn process_item(
        &self,
        session: &mut dyn Renderer,
        url: &str,
        state: &mut ItemState,
    ) -> Result<ItemOutcome, ItemError> {
        let crawler = &self.ctx.config.crawler;
        let site = &self.ctx.config.site;

        self.advance(url, state, ItemState::DedupCheck);
        if self.ctx.store.exists(url)? {
            return Ok(ItemOutcome::Skipped {
                title: String::new(),
                reason: "already crawled".to_string(),
            });
        }

        self.advance(url, state, ItemState::Navigating);
        self.ctx
            .progress
            .log(format!("Worker {}: navigating to {}", self.id, url));
        let timeout = crawler.navigation_timeout();
        match self
            .cancellable(tokio::time::timeout(timeout, session.navigate(url)))
            .await?
        {
            Ok(navigated) => navigated?,
            Err(_) => return Err(ItemError::NavigationTimeout(timeout)),
        }

        self.advance(url, state, ItemState::WaitingContent);
        let timeout = crawler.content_timeout();
        let found = self
            .cancellable(wait_for_element(
                session,
                &site.content_marker,
                timeout,
                CONTENT_POLL_INTERVAL,
            ))
            .await??;
        if !found {
            return Err(ItemError::ContentTimeout(timeout));
        }

        self.wait_for_gate(session, url, state).await?;

        self.advance(url, state, ItemState::Scrolling);
        self.scroll_to_bottom(session).await?;

        self.advance(url, state, ItemState::Extracting);
        let html = self.cancellable(session.content()).await??;
        let current = self.cancellable(session.current_url()).await??;
        let page_url = Url::parse(&current).or_else(|_| Url::parse(url))?;
        let page = self.ctx.extractor.extract_page(&html, &page_url);
        self.ctx
            .progress
            .log(format!("Worker {}: post title: {}", self.id, page.title));

        if !page.section_found {
            return Ok(ItemOutcome::Skipped {
                title: page.title,
                reason: "content section not found".to_string(),
            });
        }

        self.advance(url, state, ItemState::FetchingAssets);
        let dir = self.ctx.download_root.join(sanitize_title(&page.title));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ItemError::Io {
                path: dir.clone(),
                source,
            })?;

        let total = page.assets.len();
        self.ctx
            .progress
            .log(format!("Worker {}: found {} asset(s)", self.id, total));

        let mut saved = 0;
        for asset in &page.assets {
            // A started download always completes; cancellation is seen between assets
            if self.ctx.cancel.is_cancelled() {
                return Err(ItemError::Cancelled);
            }
            match self
                .ctx
                .fetcher
                .download(&asset.url, &self.ctx.referer, &dir, asset.index)
                .await
            {
                Ok(_) => saved += 1,
                Err(e) => self
                    .ctx
                    .progress
                    .log(format!("Worker {}: error downloading {}: {}", self.id, asset.url, e)),
            }
        }
        if self.ctx.cancel.is_cancelled() {
            return Err(ItemError::Cancelled);
        }

        self.ctx.store.record(url, &page.title)?;

        Ok(ItemOutcome::Success {
            title: page.title,
            message: format!("downloaded {} of {} assets", saved, total),
        })
    }

    /// Blocks while the page shows the verification gate
    ///
    /// Unbounded unless `gate-timeout-secs` is set; always cancellable.
    async fn wait_for_gate(
        &self,
        session: &mut dyn Renderer,
        url: &str,
        state: &mut ItemState,
    ) -> Result<(), ItemError> {
        let crawler = &self.ctx.config.crawler;
        let marker = self.ctx.config.site.gate_marker.as_str();

        let current = self.cancellable(session.current_url()).await??;
        if !current.contains(marker) {
            return Ok(());
        }

        self.advance(url, state, ItemState::GateWait);
        self.ctx.progress.notice(format!(
            "Worker {}: verification gate detected on {}; solve it in the browser window",
            self.id, url
        ));

        let started = Instant::now();
        loop {
            self.pause(crawler.gate_poll_interval()).await?;

            let current = self.cancellable(session.current_url()).await??;
            if !current.contains(marker) {
                break;
            }
            if let Some(limit) = crawler.gate_timeout() {
                if started.elapsed() >= limit {
                    return Err(ItemError::GateTimeout(limit));
                }
            }
            tracing::trace!("Worker {}: gate still showing for {}", self.id, url);
        }

        self.ctx
            .progress
            .log(format!("Worker {}: verification gate cleared", self.id));
        self.pause(crawler.gate_settle()).await
    }

    /// Pages down until the scroll position stops changing or the step limit is hit
    async fn scroll_to_bottom(&self, session: &mut dyn Renderer) -> Result<(), ItemError> {
        let crawler = &self.ctx.config.crawler;

        let mut last = self.cancellable(session.scroll_position()).await??;
        for _ in 0..crawler.max_scrolls {
            self.cancellable(session.page_down()).await??;
            self.pause(crawler.scroll_delay()).await?;

            let position = self.cancellable(session.scroll_position()).await??;
            if (position - last).abs() < 0.5 {
                break;
            }
            last = position;
        }

        self.pause(crawler.scroll_settle()).await
    }

    fn advance(&self, url: &str, state: &mut ItemState, next: ItemState) {
        debug_assert!(
            state.can_transition_to(next),
            "illegal item transition {} -> {}",
            state,
            next
        );
        tracing::trace!("Worker {}: {} {} -> {}", self.id, url, state, next);
        *state = next;
    }

    fn report(&self, result: &CrawlResult) {
        if !result.is_success() {
            tracing::warn!("Worker {}: {} ({})", self.id, result.url, result.state);
        }
        self.ctx
            .progress
            .log(format!("Worker {}: {}", self.id, result));
    }

    fn item_delay(&self) -> Duration {
        let crawler = &self.ctx.config.crawler;
        let (min, max) = (crawler.item_delay_min_ms, crawler.item_delay_max_ms);
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Sleeps unless the run is cancelled first
    async fn pause(&self, duration: Duration) -> Result<(), ItemError> {
        if duration.is_zero() {
            return if self.ctx.cancel.is_cancelled() {
                Err(ItemError::Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            _ = self.ctx.cancel.cancelled() => Err(ItemError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Races `fut` against cancellation of the run
    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, ItemError> {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(ItemError::Cancelled),
            out = fut => Ok(out),
        }
    }
}
