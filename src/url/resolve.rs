use url::Url;

/// Schemes and prefixes that never point at a fetchable resource
const IGNORED_PREFIXES: &[&str] = &["javascript:", "mailto:", "data:", "tel:", "#"];

/// Resolves an `href`/`src` attribute against the page it was found on
///
/// Returns `None` for empty values, in-page anchors and non-HTTP schemes.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use series_crawler::url::resolve_href;
///
/// let base = Url::parse("https://example.com/series/1").unwrap();
/// assert_eq!(
///     resolve_href(&base, "/comic/7").as_deref(),
///     Some("https://example.com/comic/7")
/// );
/// assert_eq!(resolve_href(&base, "javascript:void(0)"), None);
/// ```
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if IGNORED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Returns the lowercase extension of the last path segment, including the dot
///
/// # Examples
///
/// ```
/// use series_crawler::url::url_extension;
///
/// assert_eq!(url_extension("https://cdn.example.com/a/001.PNG?v=2").as_deref(), Some(".png"));
/// assert_eq!(url_extension("https://cdn.example.com/a/image"), None);
/// ```
pub fn url_extension(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    let segment = url.path_segments()?.last()?;
    let (stem, ext) = segment.rsplit_once('.')?;

    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some(format!(".{}", ext.to_ascii_lowercase()))
}
