//! Feed sources: HTTP retrieval, RSS/Atom/JSON Feed parsing and OPML
//! source lists.
//!
//! - [`parser`] - turns feed bytes into [`RawEntry`] values with `feed-rs`
//! - [`fetcher`] - HTTP GET with timeout, bounded retry and a body size limit
//! - [`opml`] - reads feed URLs out of an OPML subscription list

mod fetcher;
mod opml;
mod parser;

pub use fetcher::{
    FetchError, FetchSettings, Fetcher, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_FEED_BYTES,
    DEFAULT_MAX_RETRIES,
};
pub use opml::{parse_sources, read_sources, OpmlError};
pub use parser::{parse_feed, RawEntry};
