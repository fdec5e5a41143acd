use super::fetcher::{FetchError, HttpFetcher, Page, PageFetcher};
use super::html::{scan_html, ParseError};
use crate::config::FinderConfig;
use crate::util::{ensure_public_host, parse_request_url};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// The two ways a discovery can fail.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The page could not be retrieved.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// The page was retrieved but its body is not usable HTML.
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
}

/// Finds the feeds a web page advertises.
///
/// Holds an explicitly constructed fetcher so one HTTP client is reused across
/// calls and tests can swap in their own [`PageFetcher`].
///
/// # Example
///
/// ```no_run
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// use feedfinder::{FeedFinder, FinderConfig};
///
/// let finder = FeedFinder::new(FinderConfig::default())?;
/// for feed in finder.discover("https://blog.example.com/").await? {
///     println!("{feed}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FeedFinder<F = HttpFetcher> {
    fetcher: F,
    config: FinderConfig,
}

impl FeedFinder<HttpFetcher> {
    /// Creates a finder backed by a new HTTP client built from `config`.
    pub fn new(config: FinderConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self { fetcher, config })
    }
}

impl<F: PageFetcher> FeedFinder<F> {
    pub fn with_fetcher(fetcher: F, config: FinderConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fetches `url` and returns the absolute URLs of the feeds it links to.
    ///
    /// `<link rel="alternate">` elements with a feed MIME type are used when
    /// present; otherwise anchors whose href contains a feed keyword. Results
    /// are in document order without duplicates. A page that is itself a feed
    /// yields its own URL. Finding nothing is `Ok(vec![])`, not an error.
    ///
    /// # Errors
    ///
    /// [`DiscoveryError::Fetch`] for unusable URLs, network failures, non-2xx
    /// responses, timeouts and oversized bodies; [`DiscoveryError::Parse`]
    /// when the body cannot be read as HTML.
    pub async fn discover(&self, url: &str) -> Result<Vec<Url>, DiscoveryError> {
        let request_url = self.request_url(url)?;
        let page = self.fetcher.fetch(&request_url).await?;

        if self.config.detect_direct_feed && is_direct_feed(&page) {
            tracing::debug!(url = %page.url, "Page is itself a feed");
            return Ok(vec![page.url]);
        }

        let feeds = find_feeds_in_page(&page, &self.config)?;
        tracing::debug!(url = %page.url, count = feeds.len(), "Discovery finished");
        Ok(feeds)
    }

    fn request_url(&self, url: &str) -> Result<Url, FetchError> {
        let parsed = parse_request_url(url, self.config.base_url.as_deref())
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        if self.config.block_private_hosts {
            ensure_public_host(&parsed).map_err(|e| FetchError::Blocked(e.to_string()))?;
        }

        Ok(parsed)
    }
}

/// Discovers feeds for `url` with a default-configured [`FeedFinder`].
///
/// Builds a fresh HTTP client per call; keep a [`FeedFinder`] around when
/// looking up many pages.
pub async fn discover(url: &str) -> Result<Vec<Url>, DiscoveryError> {
    FeedFinder::new(FinderConfig::default())?.discover(url).await
}

/// Runs the two scanning passes over an already fetched page.
fn find_feeds_in_page(page: &Page, config: &FinderConfig) -> Result<Vec<Url>, ParseError> {
    let scanned = scan_html(&page.body, config)?;

    let base = scanned
        .base_href
        .as_deref()
        .and_then(|href| page.url.join(href.trim()).ok())
        .unwrap_or_else(|| page.url.clone());

    let links = resolve_all(&scanned.feed_links, &base);
    if !links.is_empty() || !config.anchor_fallback {
        return Ok(links);
    }

    tracing::debug!(url = %page.url, "No feed links, falling back to anchors");
    Ok(resolve_all(&scanned.feedlike_anchors, &base))
}

/// Resolves hrefs against `base`, dropping unusable ones and duplicates.
fn resolve_all(hrefs: &[String], base: &Url) -> Vec<Url> {
    dedupe(hrefs.iter().filter_map(|href| resolve_href(href, base)))
}

/// Resolves a potentially relative href into an absolute http(s) URL.
///
/// Fragments are dropped; `javascript:`, `mailto:` and similar yield `None`.
fn resolve_href(href: &str, base: &Url) -> Option<Url> {
    let mut resolved = base.join(href.trim()).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Keeps the first occurrence of each URL, preserving order.
fn dedupe(urls: impl IntoIterator<Item = Url>) -> Vec<Url> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.as_str().to_owned()))
        .collect()
}

/// Whether the fetched document is a feed rather than a page about one.
fn is_direct_feed(page: &Page) -> bool {
    if page.is_html() {
        return false;
    }
    feed_rs::parser::parse(page.body.as_slice()).is_ok()
}
