use crate::config::FinderConfig;
use crate::util::{ensure_public_host, UrlValidationError};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur while retrieving the page to inspect.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request string is not a usable http/https URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// The URL, or a redirect target, is a localhost or private address.
    #[error("Blocked host: {0}")]
    Blocked(String),
    /// Network-level error (DNS, connection, TLS, redirect policy, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The whole fetch exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large (limit {0} bytes)")]
    TooLarge(usize),
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects.
    pub url: Url,
    /// Lowercased `Content-Type` header, if the server sent one.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Page {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
    }
}

/// Source of pages for discovery.
///
/// [`HttpFetcher`] is the network implementation; tests substitute their own.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, following redirects, and returns the 2xx response body.
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError>;
}

/// Fetches pages over HTTP(S) with a reusable `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Builds a client from `config`: user agent, redirect limit and host
    /// policy, timeout.
    pub fn new(config: &FinderConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(create_redirect_policy(
                config.max_redirects,
                config.block_private_hosts,
            ))
            .timeout(config.timeout())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Wraps a caller-configured client; only the timeout and size limit
    /// come from `config`. Redirect handling is whatever the client was
    /// built with.
    pub fn with_client(client: reqwest::Client, config: &FinderConfig) -> Self {
        Self {
            client,
            timeout: config.timeout(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    async fn fetch_inner(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| match blocked_redirect(&e) {
                Some(reason) => FetchError::Blocked(reason),
                None => FetchError::Network(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let final_url = response.url().clone();
        if final_url != *url {
            tracing::debug!(from = %url, to = %final_url, "Page was redirected");
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_lowercase);

        let body = read_limited_bytes(response, self.max_body_bytes).await?;

        Ok(Page {
            url: final_url,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Page, FetchError> {
        tracing::debug!(url = %url, "Fetching page");
        tokio::time::timeout(self.timeout, self.fetch_inner(url))
            .await
            .map_err(|_| FetchError::Timeout)?
    }
}

/// Bounded redirect policy that fails on loops and, when `block_private`
/// is set, on targets that are localhost or private addresses.
fn create_redirect_policy(max_redirects: usize, block_private: bool) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error(format!("Too many redirects (max {max_redirects})"));
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        if block_private {
            if let Err(e) = ensure_public_host(url) {
                tracing::debug!(to = %url, error = %e, "Refusing redirect");
                return attempt.error(e);
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Host policy rejection raised from inside the redirect policy, if that is
/// what failed the request.
fn blocked_redirect(err: &reqwest::Error) -> Option<String> {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(rejected) = e.downcast_ref::<UrlValidationError>() {
            return Some(rejected.to_string());
        }
        source = e.source();
    }
    None
}

/// Reads a response body, giving up once it passes `limit` bytes.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::TooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_with(config: FinderConfig) -> HttpFetcher {
        HttpFetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_content_type() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html></html>")
                    .insert_header("Content-Type", "text/html; charset=UTF-8"),
            )
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/page", mock_server.uri())).unwrap();
        let page = fetcher_with(FinderConfig::default()).fetch(&url).await.unwrap();

        assert_eq!(page.url, url);
        assert_eq!(page.body, b"<html></html>");
        assert_eq!(
            page.content_type.as_deref(),
            Some("text/html; charset=utf-8")
        );
        assert!(page.is_html());
    }

    #[tokio::test]
    async fn test_fetch_follows_redirects_and_reports_final_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/new/", mock_server.uri()).as_str()),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/old", mock_server.uri())).unwrap();
        let page = fetcher_with(FinderConfig::default()).fetch(&url).await.unwrap();

        assert_eq!(page.url.path(), "/new/");
        assert_eq!(page.body, b"moved");
    }

    #[tokio::test]
    async fn test_fetch_redirect_limit_is_network_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/b", mock_server.uri()).as_str()),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/a", mock_server.uri()).as_str()),
            )
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/a", mock_server.uri())).unwrap();
        let result = fetcher_with(FinderConfig::default()).fetch(&url).await;

        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[tokio::test]
    async fn test_redirect_to_private_address_blocked() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "http://169.254.169.254/latest/meta-data/"),
            )
            .mount(&mock_server)
            .await;

        let config = FinderConfig {
            block_private_hosts: true,
            ..FinderConfig::default()
        };
        let url = Url::parse(&format!("{}/start", mock_server.uri())).unwrap();
        let result = fetcher_with(config).fetch(&url).await;

        match result {
            Err(FetchError::Blocked(reason)) => assert!(reason.contains("169.254.169.254")),
            other => panic!("expected blocked redirect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redirect_to_loopback_blocked() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/start"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", "http://localhost:9/admin"),
            )
            .mount(&mock_server)
            .await;

        let config = FinderConfig {
            block_private_hosts: true,
            ..FinderConfig::default()
        };
        let url = Url::parse(&format!("{}/start", mock_server.uri())).unwrap();
        let result = fetcher_with(config).fetch(&url).await;

        assert!(matches!(result, Err(FetchError::Blocked(_))));
    }

    #[tokio::test]
    async fn test_with_client_uses_caller_client() {
        use reqwest::header::{HeaderMap, HeaderValue};
        use wiremock::matchers::header;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-Client-Token", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("X-Client-Token", HeaderValue::from_static("abc123"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap();
        let config = FinderConfig {
            max_body_bytes: 16,
            ..FinderConfig::default()
        };
        let fetcher = HttpFetcher::with_client(client, &config);

        let url = Url::parse(&mock_server.uri()).unwrap();
        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.body, b"ok");
        assert_eq!(fetcher.max_body_bytes, 16);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/missing", mock_server.uri())).unwrap();
        let result = fetcher_with(FinderConfig::default()).fetch(&url).await;

        assert!(matches!(result, Err(FetchError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_fetch_body_over_limit_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let config = FinderConfig {
            max_body_bytes: 1024,
            ..FinderConfig::default()
        };
        let url = Url::parse(&mock_server.uri()).unwrap();
        let result = fetcher_with(config).fetch(&url).await;

        assert!(matches!(result, Err(FetchError::TooLarge(1024))));
    }

    #[tokio::test]
    async fn test_fetch_slow_response_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let config = FinderConfig {
            timeout_secs: 1,
            ..FinderConfig::default()
        };
        let url = Url::parse(&mock_server.uri()).unwrap();
        let result = fetcher_with(config).fetch(&url).await;

        // Either our outer timeout or the client's own timeout fires first
        match result {
            Err(FetchError::Timeout) => {}
            Err(FetchError::Network(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let result = fetcher_with(FinderConfig::default()).fetch(&url).await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }

    #[test]
    fn test_is_html_detection() {
        let page = |ct: Option<&str>| Page {
            url: Url::parse("https://example.com/").unwrap(),
            content_type: ct.map(str::to_string),
            body: Vec::new(),
        };
        assert!(page(Some("text/html")).is_html());
        assert!(page(Some("application/xhtml+xml")).is_html());
        assert!(!page(Some("application/rss+xml")).is_html());
        assert!(!page(None).is_html());
    }
}
