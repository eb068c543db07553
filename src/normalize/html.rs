use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Node};
use thiserror::Error;

use crate::util::{collapse_whitespace, strip_control_chars};

/// Text stored in place of a summary that could not be sanitized.
pub const SUMMARY_PLACEHOLDER: &str = "Error processing summary";

/// Entity-encoded markup decodes into new markup; give up after this many passes.
const MAX_PASSES: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SanitizeError {
    /// Markup was still present after the last extraction pass.
    #[error("markup still present after {0} extraction passes")]
    ResidualMarkup(usize),
}

fn markup_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[a-zA-Z]+[^>]*>").expect("markup regex is valid"))
}

/// Cheap structural check for an HTML-looking tag. Not a parse.
pub fn contains_markup(text: &str) -> bool {
    markup_pattern().is_match(text)
}

/// Strips markup from a feed summary, leaving the visible text.
///
/// Text without any tag is returned unchanged. Otherwise the fragment is
/// parsed, text nodes outside `<script>`/`<style>` are joined, whitespace is
/// collapsed, and terminal control characters are removed.
///
/// ```
/// use newscat::normalize::sanitize;
///
/// assert_eq!(sanitize("<p>Storm</p>").unwrap(), "Storm");
/// assert_eq!(sanitize("plain 2 < 3 text").unwrap(), "plain 2 < 3 text");
/// ```
pub fn sanitize(raw: &str) -> Result<String, SanitizeError> {
    if !contains_markup(raw) {
        return Ok(raw.to_string());
    }

    let mut text = raw.to_string();
    for _ in 0..MAX_PASSES {
        text = extract_text(&text);
        if !contains_markup(&text) {
            return Ok(strip_control_chars(&text).into_owned());
        }
    }

    Err(SanitizeError::ResidualMarkup(MAX_PASSES))
}

/// Sanitizes, falling back to [`SUMMARY_PLACEHOLDER`] on error.
pub fn sanitize_or_placeholder(raw: &str) -> String {
    sanitize(raw).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Error processing summary");
        SUMMARY_PLACEHOLDER.to_string()
    })
}

fn extract_text(fragment: &str) -> String {
    let document = Html::parse_fragment(fragment);
    let mut out = String::with_capacity(fragment.len());

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
            out.push_str(text);
            // Adjacent block elements would otherwise run their words together.
            out.push(' ');
        }
    }

    collapse_whitespace(&out)
}
