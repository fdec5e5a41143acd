//! Feed discovery for a single web page.
//!
//! Discovery is a linear pass: fetch the page, scan its HTML, resolve the
//! candidate hrefs and drop duplicates.
//!
//! # Architecture
//!
//! - [`fetcher`] - The [`PageFetcher`] seam and its reqwest-backed [`HttpFetcher`]
//! - [`html`] - `<base>`, feed `<link>` and feed-like anchor extraction using `tl`
//! - [`discovery`] - [`FeedFinder`]: the two-pass heuristic, URL resolution, dedupe
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), feedfinder::DiscoveryError> {
//! let feeds = feedfinder::discover("https://blog.example.com/").await?;
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod fetcher;
pub mod html;

pub use discovery::{discover, DiscoveryError, FeedFinder};
pub use fetcher::{FetchError, HttpFetcher, Page, PageFetcher};
pub use html::{scan_html, ParseError, ScannedPage};
