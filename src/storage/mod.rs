//! SQLite persistence for classified entries.
//!
//! The `entries` table holds one row per unique (normalized) link. The
//! storage contract the pipeline relies on:
//!
//! - [`Database::is_duplicate`] point lookup by link (the dedup gate)
//! - [`Database::insert_entries`] bulk insert as one transaction, duplicate
//!   links skipped rather than failing
//! - unique-constraint enforcement on `link`

mod entries;
mod schema;
mod types;

pub use schema::Database;
pub use types::{CategoryCount, DatabaseError, NewEntry, StoredEntry};
