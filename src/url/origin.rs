use crate::{UrlError, UrlResult};
use url::Url;

/// Parses and validates a target URL
///
/// Only HTTP and HTTPS URLs with a host are accepted.
///
/// # Arguments
///
/// * `url_str` - The URL string to validate
///
/// # Returns
///
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlError)` - The URL is malformed, uses another scheme, or has no host
///
/// # Examples
///
/// ```
/// use series_crawler::url::parse_target;
///
/// let url = parse_target("https://example.com/series/1").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
/// assert!(parse_target("ftp://example.com/").is_err());
/// ```
pub fn parse_target(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost(url_str.to_string()));
    }

    Ok(url)
}

/// Builds the referer value sent with asset requests
///
/// The referer is the origin of the target page: `scheme://host[:port]/`.
///
/// # Examples
///
/// ```
/// use series_crawler::url::referer_for;
///
/// let referer = referer_for("https://example.com:8443/comic/12?page=2").unwrap();
/// assert_eq!(referer, "https://example.com:8443/");
/// ```
pub fn referer_for(target_url: &str) -> UrlResult<String> {
    let url = parse_target(target_url)?;
    let host = url
        .host_str()
        .ok_or_else(|| UrlError::MissingHost(target_url.to_string()))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    })
}
