use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{CategoryCount, EntryDbRow, NewEntry, StoredEntry};
use crate::classify::Category;
use crate::normalize::normalize_link;

/// Rows per INSERT statement: 6 bound columns * 50 = 300, well under
/// SQLite's 999 parameter limit.
const BATCH_SIZE: usize = 50;

/// Maximum number of entries returned by listing queries (OOM protection)
const MAX_ENTRIES: i64 = 2000;

impl Database {
    // ========================================================================
    // Deduplication Gate
    // ========================================================================

    /// True when an entry with the same normalized link is already stored.
    ///
    /// `http://x/a/` and `http://x/a` are the same entry.
    pub async fn is_duplicate(&self, link: &str) -> Result<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM entries WHERE link = ?")
            .bind(normalize_link(link))
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    // ========================================================================
    // Batch Persist
    // ========================================================================

    /// Insert a batch of entries in a single transaction.
    ///
    /// Returns the number of rows actually inserted. A link that is already
    /// stored, or repeated within the batch, is skipped rather than failing
    /// the batch (`ON CONFLICT(link) DO NOTHING`). Any other error rolls the
    /// whole batch back.
    pub async fn insert_entries(&self, entries: &[NewEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut inserted: u64 = 0;

        for chunk in entries.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO entries (title, link, summary, published, category, fetched_at) ",
            );
            builder.push_values(chunk, |mut b, entry| {
                b.push_bind(&entry.title)
                    .push_bind(normalize_link(&entry.link))
                    .push_bind(&entry.summary)
                    .push_bind(entry.published.map(|dt| dt.timestamp()))
                    .push_bind(entry.category.label())
                    .push_bind(now);
            });
            builder.push(" ON CONFLICT(link) DO NOTHING");

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted as usize)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Point lookup by link (normalized before the lookup).
    pub async fn get_entry_by_link(&self, link: &str) -> Result<Option<StoredEntry>> {
        let row = sqlx::query_as::<_, EntryDbRow>(
            r#"
            SELECT id, title, link, summary, published, category, fetched_at
            FROM entries
            WHERE link = ?
        "#,
        )
        .bind(normalize_link(link))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EntryDbRow::into_entry))
    }

    pub async fn count_entries(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Entry counts per category, largest first.
    pub async fn category_counts(&self) -> Result<Vec<CategoryCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT category, COUNT(*) AS n
            FROM entries
            GROUP BY category
            ORDER BY n DESC, category ASC
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(label, count)| CategoryCount {
                category: label.parse().unwrap_or(Category::Unknown),
                count,
            })
            .collect())
    }

    /// Most recent entries by publish date (undated entries last), capped at
    /// 2000.
    pub async fn recent_entries(&self, limit: i64) -> Result<Vec<StoredEntry>> {
        let limit = limit.clamp(0, MAX_ENTRIES);
        let rows = sqlx::query_as::<_, EntryDbRow>(
            r#"
            SELECT id, title, link, summary, published, category, fetched_at
            FROM entries
            ORDER BY published IS NULL, published DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EntryDbRow::into_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn entry(link: &str, category: Category) -> NewEntry {
        NewEntry {
            title: format!("Title for {link}"),
            link: link.to_string(),
            summary: "Summary".to_string(),
            published: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            category,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = test_db().await;
        let count = db
            .insert_entries(&[entry("https://example.com/a", Category::Sports)])
            .await
            .unwrap();
        assert_eq!(count, 1);

        let stored = db
            .get_entry_by_link("https://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "Title for https://example.com/a");
        assert_eq!(stored.category, Category::Sports);
        assert_eq!(
            stored.published,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let db = test_db().await;
        assert_eq!(db.insert_entries(&[]).await.unwrap(), 0);
        assert_eq!(db.count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_noop_not_error() {
        let db = test_db().await;
        db.insert_entries(&[entry("https://example.com/a", Category::Sports)])
            .await
            .unwrap();

        let count = db
            .insert_entries(&[
                entry("https://example.com/a/", Category::Business),
                entry("https://example.com/b", Category::Business),
            ])
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(db.count_entries().await.unwrap(), 2);

        // First write wins; entries are never mutated
        let stored = db.get_entry_by_link("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(stored.category, Category::Sports);
    }

    #[tokio::test]
    async fn test_repeat_within_batch_stored_once() {
        let db = test_db().await;
        let count = db
            .insert_entries(&[
                entry("https://example.com/a", Category::Travel),
                entry("https://example.com/a", Category::Travel),
            ])
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_is_duplicate_strips_trailing_slash() {
        let db = test_db().await;
        db.insert_entries(&[entry("http://x/a", Category::WorldNews)])
            .await
            .unwrap();

        assert!(db.is_duplicate("http://x/a").await.unwrap());
        assert!(db.is_duplicate("http://x/a/").await.unwrap());
        assert!(!db.is_duplicate("http://x/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_stored_link_is_normalized() {
        let db = test_db().await;
        db.insert_entries(&[entry("http://x/a/", Category::WorldNews)])
            .await
            .unwrap();
        let stored = db.get_entry_by_link("http://x/a").await.unwrap().unwrap();
        assert_eq!(stored.link, "http://x/a");
    }

    #[tokio::test]
    async fn test_large_batch_spans_chunks() {
        let db = test_db().await;
        let batch: Vec<NewEntry> = (0..120)
            .map(|i| entry(&format!("https://example.com/{i}"), Category::Business))
            .collect();
        assert_eq!(db.insert_entries(&batch).await.unwrap(), 120);
        assert_eq!(db.count_entries().await.unwrap(), 120);
    }

    #[tokio::test]
    async fn test_null_published_round_trips() {
        let db = test_db().await;
        let mut undated = entry("https://example.com/undated", Category::Unknown);
        undated.published = None;
        db.insert_entries(&[undated]).await.unwrap();

        let stored = db
            .get_entry_by_link("https://example.com/undated")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.published, None);
        assert_eq!(stored.category, Category::Unknown);
    }

    #[tokio::test]
    async fn test_category_counts_and_recent() {
        let db = test_db().await;
        let mut older = entry("https://example.com/old", Category::Sports);
        older.published = Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap());
        let mut undated = entry("https://example.com/none", Category::Business);
        undated.published = None;

        db.insert_entries(&[
            older,
            entry("https://example.com/new", Category::Sports),
            undated,
        ])
        .await
        .unwrap();

        let counts = db.category_counts().await.unwrap();
        assert_eq!(
            counts,
            vec![
                CategoryCount {
                    category: Category::Sports,
                    count: 2
                },
                CategoryCount {
                    category: Category::Business,
                    count: 1
                },
            ]
        );

        let recent = db.recent_entries(10).await.unwrap();
        let links: Vec<&str> = recent.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/new",
                "https://example.com/old",
                "https://example.com/none"
            ]
        );
    }

    #[tokio::test]
    async fn test_insert_after_close_fails() {
        let db = test_db().await;
        db.close().await;
        assert!(db
            .insert_entries(&[entry("https://example.com/a", Category::Sports)])
            .await
            .is_err());
    }
}
