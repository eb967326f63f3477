//! Integration tests for the crawler
//!
//! These tests drive the orchestrator end-to-end with a scripted renderer and use
//! wiremock to serve the episode images.

mod support;

use series_crawler::config::Config;
use series_crawler::crawler::{partition, Orchestrator, RunParams, RunReport, RunStatus};
use series_crawler::progress::{self, ProgressEvent, ProgressReceiver};
use series_crawler::state::ResultState;
use series_crawler::storage::{keys, DedupStore, SqliteStorage, Storage};
use series_crawler::CrawlerError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::{
    episode_html, events, fast_config, listing_html, no_section_html, progress_values,
    FakeRendererFactory, FakeSite,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One test run: temp directories, store, fake site and image server
struct Fixture {
    dir: TempDir,
    server: MockServer,
    site: Arc<FakeSite>,
    storage: Arc<SqliteStorage>,
    config: Config,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("crawled_pages.db");
        let storage = Arc::new(SqliteStorage::new(&db_path).unwrap());
        let config = fast_config(&db_path.to_string_lossy());
        let server = MockServer::start().await;
        mount_images(&server).await;

        Self {
            dir,
            server,
            site: FakeSite::new(),
            storage,
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    fn listing_url(&self) -> String {
        self.url("/series/42")
    }

    fn item_urls(&self, n: usize) -> Vec<String> {
        (0..n).map(|i| self.url(&format!("/comic/{}", i))).collect()
    }

    fn download_root(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// The standard image set: a JPEG, a WebP without extension, a GIF, a dead link, a PNG
    fn images(&self) -> Vec<String> {
        vec![
            self.url("/img/page1.jpg"),
            self.url("/img/page2"),
            self.url("/img/loading.gif"),
            self.url("/img/missing.png"),
            self.url("/img/page5.png"),
        ]
    }

    fn list(&self, items: &[String]) {
        self.site.page(&self.listing_url(), listing_html(items));
    }

    fn params(&self, workers: usize) -> RunParams {
        RunParams {
            target_url: self.listing_url(),
            download_root: self.download_root(),
            worker_count: workers,
        }
    }

    fn orchestrator(&self) -> (Orchestrator<SqliteStorage>, ProgressReceiver) {
        let (tx, rx) = progress::channel(4096);
        let orchestrator = Orchestrator::new(
            self.config.clone(),
            Arc::clone(&self.storage),
            FakeRendererFactory::new(Arc::clone(&self.site)),
            tx,
        )
        .unwrap();
        (orchestrator, rx)
    }

    async fn run(&self, workers: usize) -> (Result<RunReport, CrawlerError>, Vec<ProgressEvent>) {
        let (orchestrator, mut rx) = self.orchestrator();
        let result = orchestrator
            .run(self.params(workers), CancellationToken::new())
            .await;
        (result, events(&mut rx))
    }
}

async fn mount_images(server: &MockServer) {
    let referer = format!("{}/", server.uri());

    Mock::given(method("GET"))
        .and(path("/img/page1.jpg"))
        .and(header("referer", referer.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/page2"))
        .and(header("referer", referer.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/webp")
                .set_body_bytes(b"RIFF\x00\x00\x00\x00WEBP".to_vec()),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/page5.png"))
        .and(header("referer", referer.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"\x89PNG\r\n\x1a\n".to_vec()),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn count(report: &RunReport, state: ResultState) -> usize {
    report.results.iter().filter(|r| r.state == state).count()
}

#[tokio::test]
async fn test_end_to_end_seven_listed_two_done() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(7);
    fx.list(&items);

    for (i, url) in items.iter().enumerate() {
        fx.site.page(url, episode_html(&format!("Series {}화", i), &fx.images()));
    }
    // One page never renders, one has no content section
    fx.site.never_ready(&items[3]);
    fx.site.page(&items[4], no_section_html("Series 4화"));

    fx.storage.record(&items[0], "Series 0화").unwrap();
    fx.storage.record(&items[1], "Series 1화").unwrap();

    let (result, events) = fx.run(3).await;
    let report = result.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.total, 7);
    assert_eq!(report.already_done, 2);
    assert_eq!(report.progress.target, 5);
    assert_eq!(report.progress.completed, 5);
    assert_eq!(report.progress.percentage(), 100);
    assert_eq!(
        report.progress.success + report.progress.fail + report.progress.skipped,
        5
    );
    assert_eq!(count(&report, ResultState::Success), 3);
    assert_eq!(count(&report, ResultState::Fail), 1);
    assert_eq!(count(&report, ResultState::Skipped), 1);

    // Successes are recorded, the rest stay eligible for the next run
    for i in [2, 5, 6] {
        assert!(fx.storage.exists(&items[i]).unwrap(), "item {} recorded", i);
    }
    assert!(!fx.storage.exists(&items[3]).unwrap());
    assert!(!fx.storage.exists(&items[4]).unwrap());

    // Every image keeps its document position; the GIF and the dead link leave gaps
    let episode = fx.download_root().join("Series 2화");
    assert!(episode.join("001.jpg").is_file());
    assert!(episode.join("002.webp").is_file());
    assert!(!episode.join("003.gif").exists());
    assert!(!episode.join("004.png").exists());
    assert!(episode.join("005.png").is_file());
    assert_eq!(std::fs::read_dir(&episode).unwrap().count(), 3);
    let success = report
        .results
        .iter()
        .find(|r| r.url == items[2])
        .unwrap();
    assert_eq!(success.title, "Series 2화");
    assert_eq!(success.message, "downloaded 3 of 4 assets");

    // Progress never goes backwards and ends at 100
    let values = progress_values(&events);
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
    assert_eq!(values.last(), Some(&100));
    assert_eq!(events.last(), Some(&ProgressEvent::Complete(true)));

    // One listing session plus one per worker, all closed
    assert_eq!(fx.site.launches(), 4);
    assert_eq!(fx.site.closes(), 4);
}

#[tokio::test]
async fn test_remaining_items_partitioned_round_robin() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(7);
    let remaining: Vec<String> = items[2..].to_vec();

    let slots = partition(remaining, 3).unwrap();

    assert_eq!(slots[0], vec![items[2].clone(), items[5].clone()]);
    assert_eq!(slots[1], vec![items[3].clone(), items[6].clone()]);
    assert_eq!(slots[2], vec![items[4].clone()]);
}

#[tokio::test]
async fn test_each_item_visited_by_exactly_one_worker() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(6);
    fx.list(&items);
    for url in &items {
        fx.site.page(url, episode_html("Ep", &[]));
    }

    let (result, _) = fx.run(4).await;
    assert_eq!(result.unwrap().status, RunStatus::Completed);

    let mut visited: Vec<String> = fx
        .site
        .navigations()
        .into_iter()
        .filter(|u| *u != fx.listing_url())
        .collect();
    visited.sort();
    let mut expected = items.clone();
    expected.sort();
    assert_eq!(visited, expected);
}

#[tokio::test]
async fn test_gate_is_waited_out() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(1);
    fx.list(&items);
    fx.site.page(&items[0], episode_html("Gated", &[fx.url("/img/page1.jpg")]));
    fx.site.gated(&items[0], 3);

    let (result, events) = fx.run(1).await;
    let report = result.unwrap();

    assert_eq!(report.progress.success, 1);
    assert!(fx.download_root().join("Gated").join("001.jpg").is_file());
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Notice(msg) if msg.contains("verification gate")
    )));
}

#[tokio::test]
async fn test_gate_timeout_fails_item() {
    let mut fx = Fixture::new().await;
    fx.config.crawler.gate_timeout_secs = Some(1);
    let items = fx.item_urls(1);
    fx.list(&items);
    fx.site.page(&items[0], episode_html("Stuck", &[]));
    fx.site.gated(&items[0], usize::MAX);

    let (result, _) = fx.run(1).await;
    let report = result.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.progress.fail, 1);
    assert!(report.results[0].message.contains("gate"));
    assert!(!fx.storage.exists(&items[0]).unwrap());
}

#[tokio::test]
async fn test_content_timeout_fails_only_that_item() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(2);
    fx.list(&items);
    fx.site.page(&items[0], episode_html("Slow", &[]));
    fx.site.never_ready(&items[0]);
    fx.site.page(&items[1], episode_html("Fine", &[]));

    let (result, _) = fx.run(1).await;
    let report = result.unwrap();

    assert_eq!(report.results.len(), 2);
    assert_eq!(report.results[0].state, ResultState::Fail);
    assert_eq!(report.results[1].state, ResultState::Success);
}

#[tokio::test]
async fn test_cancellation_keeps_results_and_starts_nothing_new() {
    let mut fx = Fixture::new().await;
    // A long pause between items gives the stop request a place to land
    fx.config.crawler.item_delay_min_ms = 30_000;
    fx.config.crawler.item_delay_max_ms = 30_000;
    let items = fx.item_urls(4);
    fx.list(&items);
    for url in &items {
        fx.site.page(url, episode_html("Ep", &[]));
    }

    let (orchestrator, mut rx) = fx.orchestrator();
    let orchestrator = Arc::new(orchestrator);
    let cancel = CancellationToken::new();
    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        let params = fx.params(1);
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(params, cancel).await })
    };

    // Wait for the first success, then stop
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let done = matches!(&event, ProgressEvent::Log(line) if line.contains("[SUCCESS]"));
        seen.push(event);
        if done {
            break;
        }
    }
    let stopped_at = Instant::now();
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert!(stopped_at.elapsed() < Duration::from_secs(2));

    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].is_success());
    assert_eq!(report.progress.completed, 1);

    let item_visits = fx
        .site
        .navigations()
        .iter()
        .filter(|u| **u != fx.listing_url())
        .count();
    assert_eq!(item_visits, 1);
    assert_eq!(fx.site.closes(), fx.site.launches());

    seen.extend(events(&mut rx));
    assert_eq!(seen.last(), Some(&ProgressEvent::Complete(false)));
}

/// Runs one worker, cancels `settle` after the first event matching `when`, and returns
/// the report with the time the run took to stop
async fn run_and_cancel_after<F>(
    fx: &Fixture,
    when: F,
    settle: Duration,
) -> (RunReport, Duration, Vec<ProgressEvent>)
where
    F: Fn(&ProgressEvent) -> bool,
{
    let (orchestrator, mut rx) = fx.orchestrator();
    let orchestrator = Arc::new(orchestrator);
    let cancel = CancellationToken::new();
    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        let params = fx.params(1);
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(params, cancel).await })
    };

    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let matched = when(&event);
        seen.push(event);
        if matched {
            break;
        }
    }
    tokio::time::sleep(settle).await;

    let stopped_at = Instant::now();
    cancel.cancel();
    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let elapsed = stopped_at.elapsed();

    seen.extend(events(&mut rx));
    (report, elapsed, seen)
}

fn assert_cancelled_item(fx: &Fixture, report: &RunReport, url: &str, events: &[ProgressEvent]) {
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].url, url);
    assert_eq!(report.results[0].state, ResultState::Skipped);
    assert_eq!(report.results[0].message, "cancelled");
    assert!(!fx.storage.exists(url).unwrap());
    assert_eq!(fx.site.closes(), fx.site.launches());
    assert_eq!(events.last(), Some(&ProgressEvent::Complete(false)));
}

fn navigating(event: &ProgressEvent) -> bool {
    matches!(event, ProgressEvent::Log(line) if line.contains("navigating to"))
}

#[tokio::test]
async fn test_cancel_during_gate_wait() {
    let mut fx = Fixture::new().await;
    fx.config.crawler.gate_poll_interval_ms = 5_000;
    let items = fx.item_urls(1);
    fx.list(&items);
    fx.site.page(&items[0], episode_html("Stuck", &[]));
    fx.site.gated(&items[0], usize::MAX);

    let gate_notice =
        |e: &ProgressEvent| matches!(e, ProgressEvent::Notice(msg) if msg.contains("verification gate"));
    let (report, elapsed, events) =
        run_and_cancel_after(&fx, gate_notice, Duration::from_millis(50)).await;

    assert!(elapsed < Duration::from_secs(1), "stopped after {:?}", elapsed);
    assert_cancelled_item(&fx, &report, &items[0], &events);
}

#[tokio::test]
async fn test_cancel_during_content_wait() {
    let mut fx = Fixture::new().await;
    fx.config.crawler.content_timeout_secs = 30;
    let items = fx.item_urls(1);
    fx.list(&items);
    fx.site.page(&items[0], episode_html("Slow", &[]));
    fx.site.never_ready(&items[0]);

    let (report, elapsed, events) =
        run_and_cancel_after(&fx, navigating, Duration::from_millis(300)).await;

    assert!(elapsed < Duration::from_secs(1), "stopped after {:?}", elapsed);
    assert_cancelled_item(&fx, &report, &items[0], &events);
}

#[tokio::test]
async fn test_cancel_during_scroll() {
    let mut fx = Fixture::new().await;
    fx.config.crawler.scroll_delay_ms = 10_000;
    let items = fx.item_urls(1);
    fx.list(&items);
    fx.site.page(&items[0], episode_html("Long", &[]));

    let (report, elapsed, events) =
        run_and_cancel_after(&fx, navigating, Duration::from_millis(300)).await;

    assert!(elapsed < Duration::from_secs(1), "stopped after {:?}", elapsed);
    assert_cancelled_item(&fx, &report, &items[0], &events);
}

#[tokio::test]
async fn test_worker_start_is_staggered_by_slot() {
    let mut fx = Fixture::new().await;
    fx.config.crawler.stagger_interval_ms = 200;
    let items = fx.item_urls(2);
    fx.list(&items);
    for url in &items {
        fx.site.page(url, episode_html("Ep", &[]));
    }

    let started = Instant::now();
    let (result, _) = fx.run(2).await;
    let report = result.unwrap();

    // Slot 2 waits two intervals before its session starts
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_eq!(report.progress.success, 2);
}

#[tokio::test]
async fn test_cancel_before_start_reports_stopped() {
    let fx = Fixture::new().await;
    fx.list(&fx.item_urls(2));

    let (orchestrator, _rx) = fx.orchestrator();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = orchestrator.run(fx.params(2), cancel).await.unwrap();

    assert_eq!(report.status, RunStatus::Stopped);
    assert!(report.results.is_empty());
    assert_eq!(fx.site.closes(), fx.site.launches());
}

#[tokio::test]
async fn test_listing_failure_aborts_before_partitioning() {
    let fx = Fixture::new().await;
    // No listing page registered: navigation fails

    let (result, events) = fx.run(3).await;

    assert!(matches!(result, Err(CrawlerError::ListingResolution { .. })));
    assert!(events.iter().any(|e| matches!(e, ProgressEvent::Notice(_))));
    assert_eq!(events.last(), Some(&ProgressEvent::Complete(false)));
    assert!(!fx.download_root().join("list_url.txt").exists());
    assert_eq!(fx.site.launches(), 1);
    assert_eq!(fx.site.closes(), 1);
}

#[tokio::test]
async fn test_worker_launch_failure_is_run_fatal() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(3);
    fx.list(&items);
    for url in &items {
        fx.site.page(url, episode_html("Ep", &[]));
    }
    // Only the listing session can start
    fx.site.limit_launches(1);

    let (result, events) = fx.run(3).await;

    assert!(matches!(result, Err(CrawlerError::SessionLaunch { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Notice(msg) if msg.contains("Run aborted")
    )));
    assert_eq!(events.last(), Some(&ProgressEvent::Complete(false)));
    assert_eq!(fx.site.closes(), fx.site.launches());
}

#[tokio::test]
async fn test_empty_listing_is_nothing_to_crawl() {
    let fx = Fixture::new().await;
    fx.list(&[]);

    let (result, events) = fx.run(3).await;
    let report = result.unwrap();

    assert_eq!(report.status, RunStatus::NothingToCrawl);
    assert_eq!(report.progress.percentage(), 100);
    assert_eq!(progress_values(&events), vec![100]);
    assert_eq!(events.last(), Some(&ProgressEvent::Complete(true)));
}

#[tokio::test]
async fn test_everything_already_crawled() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(3);
    fx.list(&items);
    for url in &items {
        fx.storage.record(url, "done").unwrap();
    }

    let (result, _) = fx.run(2).await;
    let report = result.unwrap();

    assert_eq!(report.status, RunStatus::AllDone);
    assert_eq!(report.already_done, 3);
    // Only the listing session was started
    assert_eq!(fx.site.launches(), 1);
}

#[tokio::test]
async fn test_listing_sidecar_written_once() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(1);
    fx.list(&items);
    fx.site.page(&items[0], episode_html("Ep", &[]));

    let sidecar = fx.download_root().join("list_url.txt");
    let (first, _) = fx.run(1).await;
    first.unwrap();
    assert_eq!(std::fs::read_to_string(&sidecar).unwrap(), fx.listing_url());

    std::fs::write(&sidecar, "https://example.com/older-series").unwrap();
    let (second, _) = fx.run(1).await;
    assert_eq!(second.unwrap().status, RunStatus::AllDone);
    assert_eq!(
        std::fs::read_to_string(&sidecar).unwrap(),
        "https://example.com/older-series"
    );
}

#[tokio::test]
async fn test_second_run_skips_recorded_items() {
    let fx = Fixture::new().await;
    let items = fx.item_urls(3);
    fx.list(&items);
    for url in &items {
        fx.site.page(url, episode_html("Ep", &[]));
    }
    fx.site.page(&items[2], no_section_html("Later"));

    let (first, _) = fx.run(2).await;
    assert_eq!(first.unwrap().progress.success, 2);

    let (second, _) = fx.run(2).await;
    let report = second.unwrap();
    assert_eq!(report.already_done, 2);
    assert_eq!(report.progress.target, 1);
    assert_eq!(report.results[0].url, items[2]);
}

#[tokio::test]
async fn test_run_parameters_are_remembered() {
    let fx = Fixture::new().await;
    fx.list(&[]);

    let (result, _) = fx.run(2).await;
    result.unwrap();

    assert_eq!(
        fx.storage.get_config(keys::LAST_TARGET_URL).unwrap(),
        Some(fx.listing_url())
    );
    assert_eq!(
        fx.storage.get_config(keys::WORKER_COUNT).unwrap(),
        Some("2".to_string())
    );
}

#[tokio::test]
async fn test_invalid_worker_count_rejected() {
    let fx = Fixture::new().await;
    fx.list(&[]);

    let (orchestrator, _rx) = fx.orchestrator();
    let zero = orchestrator.run(fx.params(0), CancellationToken::new()).await;
    let eleven = orchestrator.run(fx.params(11), CancellationToken::new()).await;

    assert!(matches!(zero, Err(CrawlerError::Config(_))));
    assert!(matches!(eleven, Err(CrawlerError::Config(_))));
    assert_eq!(fx.site.launches(), 0);
}
