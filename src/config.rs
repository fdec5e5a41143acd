//! Discovery settings.
//!
//! Every field has a default, so `FinderConfig::default()` is a complete
//! configuration. A TOML file is only read when the caller names one
//! explicitly. A named file that does not exist is an error; an empty one
//! yields the defaults.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but cannot be used.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Defaults
// ============================================================================

/// MIME types a `<link rel="alternate">` must carry to count as a feed.
pub const DEFAULT_FEED_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/rdf+xml",
    "application/feed+json",
    "application/x-rss+xml",
    "application/x-atom+xml",
];

/// Substrings that make an anchor `href` look like a feed link.
pub const DEFAULT_ANCHOR_KEYWORDS: &[&str] = &["rss", "atom", "feed", ".xml", ".rdf"];

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024; // 5MB
const DEFAULT_MAX_REDIRECTS: usize = 10;

// ============================================================================
// Configuration Struct
// ============================================================================

/// Settings for a [`FeedFinder`](crate::FeedFinder).
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Upper bound for the whole page fetch (connect, redirects, body).
    pub timeout_secs: u64,

    /// Response bodies larger than this are rejected.
    pub max_body_bytes: usize,

    /// Maximum number of redirects followed before giving up.
    pub max_redirects: usize,

    /// `User-Agent` header sent with the page request.
    pub user_agent: String,

    /// Accepted `type` values for `<link rel="alternate">` feed links.
    pub feed_types: Vec<String>,

    /// Substrings checked against anchor hrefs in the fallback pass.
    pub anchor_keywords: Vec<String>,

    /// Scan anchors when the page has no feed `<link>` elements.
    pub anchor_fallback: bool,

    /// Report the requested URL itself when it already serves a feed.
    pub detect_direct_feed: bool,

    /// Refuse to fetch localhost and private network addresses.
    pub block_private_hosts: bool,

    /// Base for relative request URLs.
    pub base_url: Option<String>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            feed_types: DEFAULT_FEED_TYPES.iter().map(|s| s.to_string()).collect(),
            anchor_keywords: DEFAULT_ANCHOR_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            anchor_fallback: true,
            detect_direct_feed: true,
            block_private_hosts: false,
            base_url: None,
        }
    }
}

impl FinderConfig {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "timeout_secs",
        "max_body_bytes",
        "max_redirects",
        "user_agent",
        "feed_types",
        "anchor_keywords",
        "anchor_fallback",
        "detect_direct_feed",
        "block_private_hosts",
        "base_url",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing or unreadable file → `Err(ConfigError::Io)`
    /// - Empty file → `Ok(FinderConfig::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Unusable values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: FinderConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Checks values that deserialize fine but would make discovery useless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be at least 1".into()));
        }
        if self.feed_types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("feed_types must not be empty".into()));
        }
        if let Some(base) = &self.base_url {
            url::Url::parse(base)
                .map_err(|e| ConfigError::Invalid(format!("base_url '{base}': {e}")))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
