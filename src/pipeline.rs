//! Ingestion pipeline: fetch → sanitize → date → classify → dedup → batch →
//! persist, one source at a time.
//!
//! Failure policy per stage:
//!
//! | stage | on failure |
//! |---|---|
//! | fetch | source skipped, run continues |
//! | sanitize | summary replaced by the placeholder |
//! | date | entry stored without a date |
//! | classify | category `Unknown` |
//! | dedup lookup / persist | [`PipelineError`], run stops |

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::classify::Classifier;
use crate::feed::{FetchError, Fetcher, RawEntry};
use crate::normalize::{normalize_date, normalize_link, sanitize_or_placeholder};
use crate::storage::{Database, NewEntry};
use crate::util::strip_control_chars;

pub const DEFAULT_ENTRY_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The batch for `url` could not be written; nothing from it was stored.
    #[error("Failed to store entries from {url}: {error:#}")]
    Persist { url: String, error: anyhow::Error },

    /// The duplicate lookup for `link` failed.
    #[error("Duplicate check failed for {link}: {error:#}")]
    Storage { link: String, error: anyhow::Error },
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Pause between consecutive entries of one source. Not applied after the
    /// last entry.
    pub entry_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            entry_delay: DEFAULT_ENTRY_DELAY,
        }
    }
}

#[derive(Debug)]
pub enum FetchStatus {
    Fetched,
    Failed(FetchError),
}

/// Outcome of one source.
#[derive(Debug)]
pub struct SourceReport {
    pub url: String,
    /// Entries in the feed document
    pub fetched: usize,
    /// Rows actually inserted
    pub stored: usize,
    /// Entries already stored, repeated within the feed, or lost to a
    /// concurrent insert
    pub duplicates: usize,
    /// Entries missing a title, summary or link
    pub skipped_ineligible: usize,
    pub status: FetchStatus,
}

impl SourceReport {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            fetched: 0,
            stored: 0,
            duplicates: 0,
            skipped_ineligible: 0,
            status: FetchStatus::Fetched,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FetchStatus::Failed(_))
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub sources: Vec<SourceReport>,
    pub total_stored: usize,
}

impl RunReport {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_failed()).count()
    }
}

enum EntryOutcome {
    Candidate(NewEntry),
    Duplicate,
    Ineligible,
}

pub struct Pipeline {
    db: Database,
    fetcher: Fetcher,
    classifier: Classifier,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        db: Database,
        fetcher: Fetcher,
        classifier: Classifier,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            fetcher,
            classifier,
            settings,
        }
    }

    /// Ingest every source in order.
    ///
    /// # Errors
    ///
    /// Stops at the first [`PipelineError`]. Sources processed before it keep
    /// what they stored. Fetch failures are not errors: they are recorded in
    /// the source's report and the run moves on.
    pub async fn run(&self, sources: &[String]) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();

        for url in sources {
            let source = self.ingest_source(url).await?;
            report.total_stored += source.stored;
            tracing::info!(
                source = %url,
                stored = source.stored,
                total_stored = report.total_stored,
                "Source complete"
            );
            report.sources.push(source);
        }

        Ok(report)
    }

    /// Fetch one source and ingest its entries.
    pub async fn ingest_source(&self, url: &str) -> Result<SourceReport, PipelineError> {
        let entries = match self.fetcher.fetch(url).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(source = %url, error = %e, "Failed to fetch feed, skipping source");
                let mut report = SourceReport::new(url);
                report.status = FetchStatus::Failed(e);
                return Ok(report);
            }
        };

        tracing::info!(source = %url, entries = entries.len(), "Fetched feed");
        self.ingest_entries(url, entries).await
    }

    /// Ingest already-fetched entries attributed to `url`, in order.
    pub async fn ingest_entries(
        &self,
        url: &str,
        entries: Vec<RawEntry>,
    ) -> Result<SourceReport, PipelineError> {
        let mut report = SourceReport::new(url);
        report.fetched = entries.len();

        let mut batch: Vec<NewEntry> = Vec::new();
        let mut pending: HashSet<String> = HashSet::new();
        let last = entries.len().saturating_sub(1);

        for (i, raw) in entries.into_iter().enumerate() {
            match self.process_entry(url, raw, &pending).await? {
                EntryOutcome::Candidate(entry) => {
                    pending.insert(entry.link.clone());
                    batch.push(entry);
                }
                EntryOutcome::Duplicate => report.duplicates += 1,
                EntryOutcome::Ineligible => report.skipped_ineligible += 1,
            }

            if i < last && !self.settings.entry_delay.is_zero() {
                tokio::time::sleep(self.settings.entry_delay).await;
            }
        }

        if batch.is_empty() {
            tracing::info!(
                source = %url,
                duplicates = report.duplicates,
                "No new entries to store"
            );
            return Ok(report);
        }

        let stored = self
            .db
            .insert_entries(&batch)
            .await
            .map_err(|error| PipelineError::Persist {
                url: url.to_string(),
                error,
            })?;

        // Rows that lost a race with another writer between gate and insert
        report.duplicates += batch.len() - stored;
        report.stored = stored;
        tracing::info!(
            source = %url,
            stored = stored,
            duplicates = report.duplicates,
            "Stored entries"
        );

        Ok(report)
    }

    async fn process_entry(
        &self,
        source: &str,
        raw: RawEntry,
        pending: &HashSet<String>,
    ) -> Result<EntryOutcome, PipelineError> {
        let RawEntry {
            title,
            link,
            summary,
            published,
        } = raw;

        let link = link
            .map(|l| normalize_link(&l).to_string())
            .filter(|l| !l.is_empty());
        let summary =
            summary.map(|s| strip_control_chars(&sanitize_or_placeholder(&s)).into_owned());
        let published = match normalize_date(published.as_deref()) {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Unparseable publish date, storing without one");
                None
            }
        };

        tracing::info!(
            title = %title.as_deref().unwrap_or_default(),
            link = %link.as_deref().unwrap_or_default(),
            summary = %summary.as_deref().unwrap_or_default(),
            published = %published.map_or_else(|| "No Date".to_string(), |d| d.to_rfc3339()),
            "Entry"
        );

        let title = title.filter(|t| !t.trim().is_empty());
        let summary = summary.filter(|s| !s.trim().is_empty());
        let (Some(title), Some(summary), Some(link)) = (title, summary, link) else {
            tracing::debug!(source = %source, "Entry missing title, summary or link, not storing");
            return Ok(EntryOutcome::Ineligible);
        };

        let category = self.classifier.classify_async(&title, &summary).await;
        tracing::info!(link = %link, category = %category, "Classified entry");

        let duplicate = pending.contains(&link)
            || self
                .db
                .is_duplicate(&link)
                .await
                .map_err(|error| PipelineError::Storage {
                    link: link.clone(),
                    error,
                })?;
        if duplicate {
            tracing::info!(link = %link, source = %source, "Duplicate entry, skipping");
            return Ok(EntryOutcome::Duplicate);
        }

        Ok(EntryOutcome::Candidate(NewEntry {
            title,
            link,
            summary,
            published,
            category,
        }))
    }
}
