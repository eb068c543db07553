//! Utility functions shared across the ingester.
//!
//! - **URL validation**: SSRF-safe checks for configured feed sources
//! - **Text processing**: control-character stripping and whitespace cleanup
//!
//! # Examples
//!
//! ```
//! use newscat::util::{strip_control_chars, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(strip_control_chars("\x1b[1mBreaking\x1b[0m"), "Breaking");
//! ```

mod text;
mod url_validator;

pub use text::{collapse_whitespace, strip_control_chars};
pub use url_validator::{validate_sources, validate_url, UrlValidationError};
