//! URL helpers shared by the fetch layer and the CLI.
//!
//! - **Request parsing**: absolute `http`/`https` URLs, with optional base
//! - **Host policy**: opt-in rejection of localhost and private addresses
//!
//! # Examples
//!
//! ```
//! use feedfinder::util::{ensure_public_host, parse_request_url};
//!
//! let url = parse_request_url("https://example.com/", None).unwrap();
//! assert!(ensure_public_host(&url).is_ok());
//! ```

mod url_validator;

pub use url_validator::{ensure_public_host, parse_request_url, UrlValidationError};
