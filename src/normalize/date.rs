use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// The canonical RSS `pubDate` layout, e.g. `Mon, 01 Jan 2024 10:00:00 +0000`.
pub const FEED_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Offset-less date-time layouts, read as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%d %b %Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

/// Date-only layouts, read as midnight UTC.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%B %d, %Y", "%b %d, %Y", "%Y/%m/%d"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("unrecognized date format: {0:?}")]
    Unparseable(String),
}

/// Resolves a raw feed date string to a UTC timestamp.
///
/// Absent input is not an error. A strict parse against
/// [`FEED_DATE_FORMAT`] is tried first, then the permissive fallbacks.
///
/// ```
/// use newscat::normalize::normalize_date;
///
/// let ts = normalize_date(Some("Mon, 01 Jan 2024 10:00:00 +0000")).unwrap().unwrap();
/// assert_eq!(ts.to_rfc3339(), "2024-01-01T10:00:00+00:00");
/// assert_eq!(normalize_date(None), Ok(None));
/// assert!(normalize_date(Some("yesterday-ish")).is_err());
/// ```
pub fn normalize_date(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, DateError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();

    parse_strict(trimmed)
        .or_else(|| parse_permissive(trimmed))
        .or_else(|| parse_ignoring_weekday(trimmed))
        .map(Some)
        .ok_or_else(|| DateError::Unparseable(raw.to_string()))
}

fn parse_strict(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, FEED_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_permissive(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    // RFC 2822 covers named zones (GMT, EST) and a missing weekday.
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Feeds often carry a weekday that disagrees with the date; the date wins.
fn parse_ignoring_weekday(s: &str) -> Option<DateTime<Utc>> {
    let (weekday, rest) = s.split_once(", ")?;
    if weekday.is_empty() || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc2822(rest))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
