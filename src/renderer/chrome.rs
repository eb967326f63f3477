//! Chromium backend driven over the DevTools protocol

use crate::config::BrowserConfig as BrowserSettings;
use crate::renderer::{Renderer, RendererError, RendererFactory, RendererResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;

const SCROLL_BY_VIEWPORT: &str = "window.scrollBy(0, window.innerHeight)";
const SCROLL_POSITION: &str = "window.scrollY";

fn protocol(e: CdpError) -> RendererError {
    RendererError::Protocol(e.to_string())
}

/// Launches one Chromium process per session
pub struct ChromeRendererFactory {
    headless: bool,
    executable: Option<PathBuf>,
    launched: AtomicUsize,
}

impl ChromeRendererFactory {
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            headless: settings.headless,
            executable: settings.executable.clone(),
            launched: AtomicUsize::new(0),
        }
    }

    /// Each concurrent browser needs its own profile directory
    fn profile_dir(&self) -> PathBuf {
        let n = self.launched.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("series-crawler-{}-{}", std::process::id(), n))
    }
}

#[async_trait]
impl RendererFactory for ChromeRendererFactory {
    async fn launch(&self) -> RendererResult<Box<dyn Renderer>> {
        let profile_dir = self.profile_dir();

        let mut builder = BrowserConfig::builder().user_data_dir(&profile_dir);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(RendererError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RendererError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(RendererError::Launch(e.to_string()));
            }
        };

        tracing::debug!("Launched Chromium session in {}", profile_dir.display());

        Ok(Box::new(ChromeRenderer {
            browser,
            page,
            handler_task,
            profile_dir,
        }))
    }
}

/// A single Chromium process with one page
pub struct ChromeRenderer {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn navigate(&mut self, url: &str) -> RendererResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| RendererError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> RendererResult<bool> {
        // A missing node surfaces as an error from the protocol
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn current_url(&mut self) -> RendererResult<String> {
        let url = self.page.url().await.map_err(protocol)?;
        Ok(url.unwrap_or_default())
    }

    async fn content(&mut self) -> RendererResult<String> {
        self.page.content().await.map_err(protocol)
    }

    async fn page_down(&mut self) -> RendererResult<()> {
        self.page
            .evaluate(SCROLL_BY_VIEWPORT)
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn scroll_position(&mut self) -> RendererResult<f64> {
        self.page
            .evaluate(SCROLL_POSITION)
            .await
            .map_err(protocol)?
            .into_value::<f64>()
            .map_err(|e| RendererError::Protocol(e.to_string()))
    }

    async fn close(self: Box<Self>) -> RendererResult<()> {
        let ChromeRenderer {
            mut browser,
            page,
            handler_task,
            profile_dir,
        } = *self;

        if let Err(e) = page.close().await {
            tracing::debug!("Page close failed: {}", e);
        }
        let closed = browser.close().await.map_err(protocol);
        if closed.is_ok() {
            let _ = browser.wait().await;
        }
        handler_task.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&profile_dir).await {
            tracing::trace!("Could not remove {}: {}", profile_dir.display(), e);
        }

        closed.map(|_| ())
    }
}
