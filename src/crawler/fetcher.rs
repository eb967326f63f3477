//! Asset fetcher
//!
//! This module downloads the images of an episode, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Sending the site origin as referer
//! - Choosing a file extension from the declared content type
//! - Writing numbered files into the episode directory

use crate::config::FetchConfig;
use crate::url::url_extension;
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension used when neither the response nor the URL names one
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Errors from a single asset download
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request for {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Builds the HTTP client used for asset downloads
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .connect_timeout(config.timeout().min(std::time::Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a declared content type to a file extension
///
/// Order: known image types, then the MIME registry, then the URL's own extension,
/// then [`DEFAULT_EXTENSION`]. Generic binary types count as undeclared.
///
/// # Examples
///
/// ```
/// use series_crawler::crawler::resolve_extension;
///
/// assert_eq!(resolve_extension(Some("image/webp"), "https://cdn.example.com/img/123"), ".webp");
/// assert_eq!(resolve_extension(None, "https://cdn.example.com/img/123.png"), ".png");
/// assert_eq!(resolve_extension(None, "https://cdn.example.com/img/123"), ".jpg");
/// ```
pub fn resolve_extension(content_type: Option<&str>, url: &str) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    if let Some(ext) = essence.as_deref().and_then(extension_for_mime) {
        return ext;
    }

    url_extension(url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn extension_for_mime(mime: &str) -> Option<String> {
    let known = match mime {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        "image/webp" => Some(".webp"),
        "image/avif" => Some(".avif"),
        "image/bmp" => Some(".bmp"),
        "image/svg+xml" => Some(".svg"),
        "application/octet-stream" | "binary/octet-stream" => return None,
        _ => None,
    };
    if let Some(ext) = known {
        return Some(ext.to_string());
    }

    mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{}", ext))
}

/// Downloads assets of one episode
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: Client,
}

impl AssetFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    /// Fetches one asset and stores it as `<dir>/<NNN><ext>`
    ///
    /// `index` is 1-based. Returns the written path.
    pub async fn download(
        &self,
        url: &str,
        referer: &str,
        dir: &Path,
        index: usize,
    ) -> Result<PathBuf, AssetError> {
        let request_error = |source| AssetError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(REFERER, referer)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(request_error)?;

        let ext = resolve_extension(content_type.as_deref(), url);
        let path = dir.join(format!("{:03}{}", index, ext));

        tokio::fs::write(&path, &body)
            .await
            .map_err(|source| AssetError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::trace!("Saved {} ({} bytes)", path.display(), body.len());
        Ok(path)
    }
}
