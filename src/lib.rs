//! Find the Atom/RSS feeds a web page advertises.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use feedfinder::{FeedFinder, FinderConfig};
//!
//! let finder = FeedFinder::new(FinderConfig::default())?;
//! let feeds = finder.discover("https://blog.example.com/").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod feed;
pub mod util;

pub use config::{ConfigError, FinderConfig};
pub use feed::{
    discover, DiscoveryError, FeedFinder, FetchError, HttpFetcher, Page, PageFetcher, ParseError,
};
