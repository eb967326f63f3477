//! Console presentation of a running crawl

use crate::crawler::RunReport;
use crate::progress::{ProgressEvent, ProgressReceiver};
use crate::state::ResultState;
use std::io::{Stdout, Write};
use std::time::Duration;

/// How often buffered progress events are flushed to the console
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Drains the progress channel at a fixed cadence and prints each event
pub struct ConsoleReporter<W: Write = Stdout> {
    receiver: ProgressReceiver,
    out: W,
    interval: Duration,
    last_progress: Option<u8>,
    completed: Option<bool>,
}

impl ConsoleReporter<Stdout> {
    pub fn new(receiver: ProgressReceiver) -> Self {
        Self::with_writer(receiver, std::io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(receiver: ProgressReceiver, out: W) -> Self {
        Self {
            receiver,
            out,
            interval: DEFAULT_DRAIN_INTERVAL,
            last_progress: None,
            completed: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Prints events until every sender is dropped
    ///
    /// Returns the writer and the last terminal status seen, if any.
    pub async fn run(mut self) -> (W, Option<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let (events, open) = self.receiver.drain();
            for event in events {
                self.render(event);
            }
            let _ = self.out.flush();
            if !open {
                break;
            }
        }

        (self.out, self.completed)
    }

    fn render(&mut self, event: ProgressEvent) {
        let written = match event {
            ProgressEvent::Log(line) => writeln!(self.out, "{}", line),
            ProgressEvent::Progress(percent) => {
                // Repeated percentages carry no news
                if self.last_progress == Some(percent) {
                    return;
                }
                self.last_progress = Some(percent);
                writeln!(self.out, "[{:>3}%]", percent)
            }
            ProgressEvent::Notice(message) => writeln!(self.out, "!! {}", message),
            ProgressEvent::Complete(success) => {
                self.completed = Some(success);
                if success {
                    writeln!(self.out, "== done ==")
                } else {
                    writeln!(self.out, "== stopped ==")
                }
            }
        };
        if let Err(e) = written {
            tracing::debug!("Console write failed: {}", e);
        }
    }
}

/// Prints the final report of a run
pub fn print_report(report: &RunReport) {
    let progress = &report.progress;

    println!("\n=== Crawl Report ===\n");
    println!("Status:          {}", report.status);
    println!("Listed items:    {}", report.total);
    println!("Already crawled: {}", report.already_done);
    println!("Processed:       {} / {}", progress.completed, progress.target);
    println!("  Success: {}", progress.success);
    println!("  Failed:  {}", progress.fail);
    println!("  Skipped: {}", progress.skipped);

    let problems: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.state == ResultState::Fail)
        .collect();
    if !problems.is_empty() {
        println!("\nFailures:");
        for result in problems {
            println!("  - {}: {}", result.url, result.message);
        }
    }
}
