//! Crawl orchestrator - run-level coordination
//!
//! This module contains the run loop that coordinates one crawl, including:
//! - Resolving the series listing in a short-lived renderer session
//! - Filtering out episodes finished by earlier runs
//! - Partitioning the rest across the worker pool
//! - Merging worker results into progress and the final report
//! - Cooperative cancellation with a bounded grace period

use crate::config::{validate_worker_count, Config, RECOMMENDED_MAX_WORKERS};
use crate::crawler::extractor::ContentExtractor;
use crate::crawler::fetcher::AssetFetcher;
use crate::crawler::partition::partition;
use crate::crawler::worker::{CrawlWorker, WorkerContext};
use crate::progress::ProgressSender;
use crate::renderer::{wait_for_element, RendererFactory, SessionGuard};
use crate::state::{CrawlResult, ProgressState};
use crate::storage::{keys, Storage};
use crate::url::{parse_target, referer_for};
use crate::CrawlerError;
use futures::FutureExt;
use std::any::Any;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// How often the listing container is polled while the listing loads
const LISTING_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Parameters of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    pub target_url: String,
    pub download_root: PathBuf,
    pub worker_count: usize,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every pending item was processed
    Completed,
    /// Cancellation was requested before the pool finished
    Stopped,
    /// The listing linked to no items
    NothingToCrawl,
    /// Every listed item was already recorded
    AllDone,
}

impl RunStatus {
    /// True when the run was not interrupted
    pub fn is_complete(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::NothingToCrawl => "nothing to crawl",
            Self::AllDone => "all done",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    /// Items linked from the listing
    pub total: usize,
    /// Items skipped up front because the store already had them
    pub already_done: usize,
    pub progress: ProgressState,
    /// Results in the order worker slots finished
    pub results: Vec<CrawlResult>,
}

impl RunReport {
    fn empty(status: RunStatus, total: usize, already_done: usize) -> Self {
        Self {
            status,
            total,
            already_done,
            progress: ProgressState::new(0),
            results: Vec::new(),
        }
    }
}

/// What a worker task hands back to the merge loop
struct SlotOutcome {
    id: usize,
    assigned: usize,
    result: Result<crate::Result<Vec<CrawlResult>>, Box<dyn Any + Send>>,
}

/// Coordinates crawl runs against one store and renderer backend
pub struct Orchestrator<S: ?Sized> {
    config: Arc<Config>,
    store: Arc<S>,
    factory: Arc<dyn RendererFactory>,
    extractor: Arc<ContentExtractor>,
    fetcher: AssetFetcher,
    progress: ProgressSender,
}

impl<S: Storage + ?Sized + 'static> Orchestrator<S> {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration (selectors are compiled here)
    /// * `store` - Dedup store and persisted settings
    /// * `factory` - Launches renderer sessions
    /// * `progress` - Producer half of the progress channel
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(CrawlerError)` - A selector failed to compile or the HTTP client could not be built
    pub fn new(
        config: Config,
        store: Arc<S>,
        factory: Arc<dyn RendererFactory>,
        progress: ProgressSender,
    ) -> crate::Result<Self> {
        let extractor = ContentExtractor::new(&config.site)?;
        let fetcher = AssetFetcher::from_config(&config.fetch)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            factory,
            extractor: Arc::new(extractor),
            fetcher,
            progress,
        })
    }

    /// Runs one crawl to completion or cancellation
    ///
    /// Cancelling `cancel` stops the run cooperatively. Results produced before the stop
    /// are kept in the report. A listing that cannot be resolved, or a worker whose
    /// renderer session cannot be launched, aborts the run with an error.
    pub async fn run(
        &self,
        params: RunParams,
        cancel: CancellationToken,
    ) -> crate::Result<RunReport> {
        validate_worker_count(params.worker_count)?;
        if params.worker_count > RECOMMENDED_MAX_WORKERS {
            tracing::warn!(
                "{} workers requested; more than {} concurrent sessions tends to get blocked upstream",
                params.worker_count,
                RECOMMENDED_MAX_WORKERS
            );
        }

        let target = parse_target(&params.target_url)?;
        let referer = referer_for(target.as_str())?;
        self.remember_params(&params);

        // Fatal worker errors cancel this token only; the caller's token is left alone
        let run_cancel = cancel.child_token();

        self.progress
            .log(format!("Resolving listing {}", params.target_url));
        let items = match self.resolve_listing(&target, &run_cancel).await {
            Ok(Some(items)) => items,
            Ok(None) => {
                self.progress.log("Crawl stopped while resolving the listing");
                self.progress.complete(false);
                return Ok(RunReport::empty(RunStatus::Stopped, 0, 0));
            }
            Err(e) => {
                tracing::error!("Listing resolution failed: {}", e);
                self.progress.notice(format!("Could not load the listing: {}", e));
                self.progress.complete(false);
                return Err(e);
            }
        };

        if items.is_empty() {
            self.progress.log("Nothing to crawl");
            self.progress.progress(100);
            self.progress.complete(true);
            return Ok(RunReport::empty(RunStatus::NothingToCrawl, 0, 0));
        }

        tokio::fs::create_dir_all(&params.download_root).await?;
        self.write_listing_sidecar(&params.download_root, &params.target_url)?;

        let total = items.len();
        let mut pending = Vec::with_capacity(total);
        for item in items {
            if !self.store.exists(&item)? {
                pending.push(item);
            }
        }
        let already_done = total - pending.len();
        self.progress.log(format!(
            "Listed {} item(s): {} already crawled, {} remaining",
            total,
            already_done,
            pending.len()
        ));

        if pending.is_empty() {
            self.progress.log("Everything is already crawled");
            self.progress.progress(100);
            self.progress.complete(true);
            return Ok(RunReport::empty(RunStatus::AllDone, total, already_done));
        }

        let mut tracker = ProgressState::new(pending.len());
        let slots = partition(pending, params.worker_count)?;
        self.progress.progress(tracker.percentage());

        let ctx = WorkerContext {
            config: Arc::clone(&self.config),
            extractor: Arc::clone(&self.extractor),
            fetcher: self.fetcher.clone(),
            store: Arc::clone(&self.store),
            factory: Arc::clone(&self.factory),
            progress: self.progress.clone(),
            cancel: run_cancel.clone(),
            download_root: params.download_root.clone(),
            referer,
        };

        let mut workers = JoinSet::new();
        for (index, items) in slots.into_iter().enumerate() {
            if items.is_empty() {
                continue;
            }
            let id = index + 1;
            let assigned = items.len();
            let worker = CrawlWorker::new(id, ctx.clone());
            workers.spawn(async move {
                let result = AssertUnwindSafe(worker.run(items)).catch_unwind().await;
                SlotOutcome {
                    id,
                    assigned,
                    result,
                }
            });
        }
        tracing::info!("Launched {} worker(s)", workers.len());

        let mut results = Vec::new();
        let mut failure: Option<CrawlerError> = None;

        loop {
            tokio::select! {
                biased;
                _ = run_cancel.cancelled() => break,
                joined = workers.join_next() => match joined {
                    Some(joined) => {
                        self.merge(joined, &mut tracker, &mut results, &mut failure, &run_cancel);
                    }
                    None => break,
                },
            }
        }

        if !workers.is_empty() {
            let grace = self.config.crawler.shutdown_grace();
            self.progress.log(format!(
                "Stopping; waiting up to {:?} for {} worker(s)",
                grace,
                workers.len()
            ));
            let deadline = tokio::time::Instant::now() + grace;
            while let Ok(Some(joined)) =
                tokio::time::timeout_at(deadline, workers.join_next()).await
            {
                self.merge(joined, &mut tracker, &mut results, &mut failure, &run_cancel);
            }
            if !workers.is_empty() {
                tracing::warn!("{} worker(s) did not stop in time, aborting", workers.len());
                workers.shutdown().await;
            }
        }

        self.progress.log(format!(
            "Success: {}, failed: {}, skipped: {}",
            tracker.success, tracker.fail, tracker.skipped
        ));

        if let Some(e) = failure {
            tracing::error!("Run aborted: {}", e);
            self.progress.notice(format!("Run aborted: {}", e));
            self.progress.complete(false);
            return Err(e);
        }

        let status = if run_cancel.is_cancelled() {
            self.progress.log("Crawl stopped");
            self.progress.complete(false);
            RunStatus::Stopped
        } else {
            self.progress.progress(100);
            self.progress.log("Crawl completed");
            self.progress.complete(true);
            RunStatus::Completed
        };

        Ok(RunReport {
            status,
            total,
            already_done,
            progress: tracker,
            results,
        })
    }

    /// Loads the listing page and returns its items, or `None` when cancelled
    async fn resolve_listing(
        &self,
        target: &Url,
        cancel: &CancellationToken,
    ) -> crate::Result<Option<Vec<String>>> {
        let session = self
            .factory
            .launch()
            .await
            .map_err(|source| CrawlerError::SessionLaunch {
                context: "listing".to_string(),
                source,
            })?;
        let mut guard = SessionGuard::new(session, "listing");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            loaded = self.load_listing(&mut guard, target) => loaded.map(Some),
        };

        guard.release().await;
        outcome
    }

    async fn load_listing(
        &self,
        guard: &mut SessionGuard,
        target: &Url,
    ) -> crate::Result<Vec<String>> {
        let crawler = &self.config.crawler;
        let site = &self.config.site;
        let failed = |message: String| CrawlerError::ListingResolution {
            url: target.to_string(),
            message,
        };

        let session = guard.session()?;
        let navigation = session.navigate(target.as_str());
        match tokio::time::timeout(crawler.navigation_timeout(), navigation).await {
            Ok(navigated) => navigated.map_err(|e| failed(e.to_string()))?,
            Err(_) => return Err(failed("navigation timed out".to_string())),
        }

        let found = wait_for_element(
            session,
            &site.listing_container,
            crawler.content_timeout(),
            LISTING_POLL_INTERVAL,
        )
        .await
        .map_err(|e| failed(e.to_string()))?;
        if !found {
            return Err(failed(format!(
                "'{}' did not appear within {:?}",
                site.listing_container,
                crawler.content_timeout()
            )));
        }

        let html = session.content().await.map_err(|e| failed(e.to_string()))?;
        let current = session.current_url().await.unwrap_or_default();
        let base = Url::parse(&current).unwrap_or_else(|_| target.clone());

        let items = self.extractor.resolve_listing(&html, &base);
        tracing::info!("Listing resolved to {} item(s)", items.len());
        Ok(items)
    }

    fn merge(
        &self,
        joined: Result<SlotOutcome, JoinError>,
        tracker: &mut ProgressState,
        results: &mut Vec<CrawlResult>,
        failure: &mut Option<CrawlerError>,
        run_cancel: &CancellationToken,
    ) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Worker task ended abnormally: {}", e);
                return;
            }
        };

        match outcome.result {
            Ok(Ok(slot_results)) => {
                tracing::debug!(
                    "Worker {} returned {} of {} result(s)",
                    outcome.id,
                    slot_results.len(),
                    outcome.assigned
                );
                tracker.merge(&slot_results);
                results.extend(slot_results);
            }
            Ok(Err(e)) => {
                tracing::error!("Worker {} failed: {}", outcome.id, e);
                run_cancel.cancel();
                if failure.is_none() {
                    *failure = Some(e);
                }
                return;
            }
            Err(_) => {
                tracing::error!(
                    "Worker {} panicked; counting its {} item(s) as failed",
                    outcome.id,
                    outcome.assigned
                );
                tracker.merge_lost(outcome.assigned);
            }
        }

        self.progress.progress(tracker.percentage());
    }

    /// Writes the listing URL next to the downloads, once
    fn write_listing_sidecar(&self, download_root: &Path, target_url: &str) -> crate::Result<()> {
        let path = download_root.join(&self.config.output.listing_file_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(target_url.as_bytes())?;
                tracing::debug!("Wrote {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn remember_params(&self, params: &RunParams) {
        let settings = [
            (keys::LAST_TARGET_URL, params.target_url.clone()),
            (
                keys::DOWNLOAD_ROOT,
                params.download_root.to_string_lossy().into_owned(),
            ),
            (keys::WORKER_COUNT, params.worker_count.to_string()),
        ];
        for (key, value) in settings {
            if let Err(e) = self.store.set_config(key, &value) {
                tracing::warn!("Could not persist {}: {}", key, e);
            }
        }
    }
}
