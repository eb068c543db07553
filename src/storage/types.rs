use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::classify::Category;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with operator-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("The database is locked by another process. Is another ingest run still going?")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map lock-related sqlx errors to [`DatabaseError::InstanceLocked`]
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) messages
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Data Structures
// ============================================================================

/// A classified entry ready to be persisted.
///
/// `link` is expected in normalized form (see
/// [`normalize_link`](crate::normalize::normalize_link)); the storage layer
/// normalizes again before writing.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub category: Category,
}

/// A persisted entry. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEntry {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub category: Category,
    /// Unix seconds at which the entry was stored
    pub fetched_at: i64,
}

/// Internal row type for entry queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryDbRow {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: Option<i64>,
    pub category: String,
    pub fetched_at: i64,
}

impl EntryDbRow {
    pub(crate) fn into_entry(self) -> StoredEntry {
        let category = self.category.parse().unwrap_or_else(|_| {
            tracing::warn!(id = self.id, label = %self.category, "Unrecognized stored category");
            Category::Unknown
        });
        StoredEntry {
            id: self.id,
            title: self.title,
            link: self.link,
            summary: self.summary,
            published: self.published.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            category,
            fetched_at: self.fetched_at,
        }
    }
}

/// Number of stored entries carrying one category label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: i64,
}
