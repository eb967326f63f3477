//! Ordered progress channel between the crawl engine and the presentation layer
//!
//! Producers never block: events are offered with `try_send` and dropped with a
//! warning when the consumer has fallen behind. Every event is mirrored to `tracing`
//! so a dropped event still appears in the log.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// One event on the progress channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A log line for the user
    Log(String),
    /// Overall completion in percent, 0..=100
    Progress(u8),
    /// Terminal status; true when the run finished without being stopped or failing
    Complete(bool),
    /// A blocking notice, used for run-level failures
    Notice(String),
}

/// Creates a bounded progress channel
pub fn channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSender { tx }, ProgressReceiver { rx })
}

/// Producer half, cloned into every worker
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSender {
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}", message);
        self.emit(ProgressEvent::Log(message));
    }

    pub fn progress(&self, percent: u8) {
        let percent = percent.min(100);
        tracing::debug!("Progress: {}%", percent);
        self.emit(ProgressEvent::Progress(percent));
    }

    pub fn complete(&self, success: bool) {
        tracing::info!("Run complete (success: {})", success);
        self.emit(ProgressEvent::Complete(success));
    }

    pub fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.emit(ProgressEvent::Notice(message));
    }

    fn emit(&self, event: ProgressEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Progress channel full, dropping {:?}", event);
            }
            // Nobody is listening any more; the tracing mirror is all that is left
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Consumer half, owned by the presentation layer
#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Waits for the next event; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Returns the next buffered event without waiting
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }

    /// Takes every buffered event
    ///
    /// The flag is false once all senders are dropped and the buffer is empty.
    pub fn drain(&mut self) -> (Vec<ProgressEvent>, bool) {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return (events, true),
                Err(TryRecvError::Disconnected) => return (events, false),
            }
        }
    }
}
