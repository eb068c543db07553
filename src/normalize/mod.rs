//! Per-entry normalization applied before classification.
//!
//! - [`html`] turns HTML-bearing summaries into plain text
//! - [`date`] resolves heterogeneous feed date strings to UTC timestamps
//!
//! Both report failure through explicit error types; the pipeline decides the
//! recovery (placeholder text, absent date).

mod date;
mod html;

pub use date::{normalize_date, DateError, FEED_DATE_FORMAT};
pub use html::{contains_markup, sanitize, sanitize_or_placeholder, SanitizeError, SUMMARY_PLACEHOLDER};

/// Canonical identity form of an entry link: surrounding whitespace and
/// trailing slashes removed.
///
/// ```
/// use newscat::normalize::normalize_link;
///
/// assert_eq!(normalize_link("http://x/a/"), "http://x/a");
/// assert_eq!(normalize_link(" http://x/a "), "http://x/a");
/// ```
pub fn normalize_link(link: &str) -> &str {
    link.trim().trim_end_matches('/')
}
