//! Browser rendering abstraction
//!
//! The crawl engine drives pages through the [`Renderer`] trait so that the
//! browser backend can be swapped out. Each worker owns exactly one session,
//! obtained from a [`RendererFactory`] and wrapped in a [`SessionGuard`].

mod chrome;

pub use chrome::{ChromeRenderer, ChromeRendererFactory};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a rendering backend
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Renderer session already closed")]
    Closed,
}

/// Result type for renderer operations
pub type RendererResult<T> = Result<T, RendererError>;

/// One live browser session
#[async_trait]
pub trait Renderer: Send {
    /// Loads a URL and waits for the navigation to commit
    async fn navigate(&mut self, url: &str) -> RendererResult<()>;

    /// Returns true if the current document contains a node matching `selector`
    async fn has_element(&mut self, selector: &str) -> RendererResult<bool>;

    /// The URL the session is currently showing, after redirects
    async fn current_url(&mut self) -> RendererResult<String>;

    /// Serialized HTML of the current document
    async fn content(&mut self) -> RendererResult<String>;

    /// Scrolls down by one viewport
    async fn page_down(&mut self) -> RendererResult<()>;

    /// Current vertical scroll offset in pixels
    async fn scroll_position(&mut self) -> RendererResult<f64>;

    /// Tears the session down
    async fn close(self: Box<Self>) -> RendererResult<()>;
}

/// Launches renderer sessions
#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn launch(&self) -> RendererResult<Box<dyn Renderer>>;
}

/// Polls until `selector` appears or `timeout` elapses
///
/// Returns `Ok(false)` on timeout.
pub async fn wait_for_element(
    renderer: &mut dyn Renderer,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> RendererResult<bool> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if renderer.has_element(selector).await? {
            return Ok(true);
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

/// Owns a renderer session and guarantees it is closed
///
/// Provides two cleanup paths:
/// 1. Explicit async [`SessionGuard::release`], which awaits the close and logs failures
/// 2. A `Drop` fallback that spawns the close on the runtime captured at construction
pub struct SessionGuard {
    session: Option<Box<dyn Renderer>>,
    label: String,
    runtime_handle: Option<tokio::runtime::Handle>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn Renderer>, label: impl Into<String>) -> Self {
        Self {
            session: Some(session),
            label: label.into(),
            runtime_handle: tokio::runtime::Handle::try_current().ok(),
        }
    }

    /// Mutable access to the live session
    pub fn session(&mut self) -> RendererResult<&mut dyn Renderer> {
        match self.session.as_mut() {
            Some(session) => Ok(session.as_mut()),
            None => Err(RendererError::Closed),
        }
    }

    /// Closes the session, consuming the guard
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            match session.close().await {
                Ok(()) => tracing::debug!("Closed renderer session for {}", self.label),
                Err(e) => tracing::warn!("Failed to close renderer session for {}: {}", self.label, e),
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let label = std::mem::take(&mut self.label);

        match &self.runtime_handle {
            Some(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!("Session drop cleanup failed for {}: {}", label, e);
                    } else {
                        tracing::trace!("Session drop cleanup succeeded for {}", label);
                    }
                });
            }
            None => tracing::warn!("No runtime available to close session for {}", label),
        }
    }
}
