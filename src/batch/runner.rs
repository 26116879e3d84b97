use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::feed::{parse_feed, FeedFetcher, FetchError, ParseError};
use crate::storage::{BatchStatus, Database, DatabaseError, Feed};

use super::logger::BatchLogger;

/// Default number of feeds processed concurrently
pub const DEFAULT_CHUNK_SIZE: usize = 10;

/// Errors that end processing of one feed, or of a whole batch when the
/// active feeds cannot be listed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result of processing one feed
#[derive(Debug, Clone, PartialEq)]
pub struct FeedOutcome {
    /// Articles parsed from the feed (0 when the feed failed)
    pub items_fetched: usize,
    /// Articles persisted as new bookmarks
    pub items_created: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FeedOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of one batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub feeds_total: usize,
    pub feeds_succeeded: usize,
    pub feeds_failed: usize,
    /// Sum over successful feeds only
    pub items_fetched: usize,
    pub items_created: usize,
    pub status: BatchStatus,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[FeedOutcome]) -> Self {
        let succeeded: Vec<&FeedOutcome> = outcomes.iter().filter(|o| o.is_success()).collect();
        let feeds_succeeded = succeeded.len();
        let feeds_failed = outcomes.len() - feeds_succeeded;

        Self {
            feeds_total: outcomes.len(),
            feeds_succeeded,
            feeds_failed,
            items_fetched: succeeded.iter().map(|o| o.items_fetched).sum(),
            items_created: succeeded.iter().map(|o| o.items_created).sum(),
            status: BatchStatus::from_counts(feeds_succeeded, feeds_failed),
        }
    }
}

/// Runs one ingestion batch over the active feeds.
///
/// Feeds are processed in chunks of `chunk_size`. The feeds within a chunk
/// run concurrently; chunks run one after another. A failing feed is
/// recorded and counted but never stops the other feeds.
#[derive(Clone)]
pub struct BatchRunner {
    db: Database,
    fetcher: FeedFetcher,
    logger: BatchLogger,
    chunk_size: usize,
}

impl BatchRunner {
    pub fn new(db: Database, fetcher: FeedFetcher, chunk_size: usize) -> Self {
        Self {
            logger: BatchLogger::new(db.clone()),
            db,
            fetcher,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(db: Database, config: &Config) -> Result<Self, FetchError> {
        let fetcher = FeedFetcher::new(&config.user_agent, config.max_feed_bytes)?;
        Ok(Self::new(db, fetcher, config.effective_chunk_size()))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run a batch over `feed_ids` (all active feeds when `None`).
    ///
    /// Requested ids that are unknown or inactive are ignored.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::Database` when the active feeds cannot be
    /// listed. The whole-batch log row is marked `error` in that case.
    /// Per-feed failures never surface here.
    pub async fn run(
        &self,
        job_id: Option<&str>,
        feed_ids: Option<&[i64]>,
    ) -> Result<BatchSummary, IngestError> {
        let log_id = self.logger.log_batch_start(job_id).await;

        let feeds = match self.db.get_active_feeds(feed_ids).await {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(job_id = ?job_id, error = %e, "Failed to list active feeds");
                self.logger
                    .log_batch_error(log_id, job_id, &e.to_string())
                    .await;
                return Err(e.into());
            }
        };

        tracing::info!(
            job_id = ?job_id,
            feeds = feeds.len(),
            chunk_size = self.chunk_size,
            "Batch started"
        );

        let mut outcomes = Vec::with_capacity(feeds.len());
        for chunk in feeds.chunks(self.chunk_size) {
            let results = join_all(chunk.iter().map(|feed| self.process(job_id, feed))).await;
            outcomes.extend(results);
        }

        let summary = BatchSummary::from_outcomes(&outcomes);
        self.logger.log_batch_complete(log_id, &summary).await;

        tracing::info!(
            job_id = ?job_id,
            status = %summary.status,
            feeds_succeeded = summary.feeds_succeeded,
            feeds_failed = summary.feeds_failed,
            items_fetched = summary.items_fetched,
            items_created = summary.items_created,
            "Batch finished"
        );
        Ok(summary)
    }

    /// Entry point for the periodic trigger. Never fails; errors are logged.
    pub async fn run_scheduled(&self) {
        if let Err(e) = self.run(None, None).await {
            tracing::error!(error = %e, "Scheduled batch failed");
        }
    }

    /// Process one feed and record its outcome. Failures stop here.
    async fn process(&self, job_id: Option<&str>, feed: &Feed) -> FeedOutcome {
        let started_at = Utc::now();
        let result = self.ingest_feed(feed).await;
        let finished_at = Utc::now();

        let outcome = match result {
            Ok((items_fetched, items_created)) => {
                tracing::debug!(
                    feed_id = feed.id,
                    fetched = items_fetched,
                    created = items_created,
                    "Feed processed"
                );
                FeedOutcome {
                    items_fetched,
                    items_created,
                    error: None,
                    started_at,
                    finished_at,
                }
            }
            Err(e) => {
                tracing::warn!(
                    feed_id = feed.id,
                    feed = %feed.display_name,
                    url = %feed.url,
                    error = %e,
                    "Feed processing failed"
                );
                FeedOutcome {
                    items_fetched: 0,
                    items_created: 0,
                    error: Some(e.to_string()),
                    started_at,
                    finished_at,
                }
            }
        };

        self.logger.log_feed_process(job_id, feed.id, &outcome).await;
        outcome
    }

    /// fetch → parse → dedup → persist → touch. Returns (fetched, created).
    async fn ingest_feed(&self, feed: &Feed) -> Result<(usize, usize), IngestError> {
        let xml = self.fetcher.fetch_feed(&feed.url).await?;

        let parsed = parse_feed(&xml)?;
        if parsed.skipped > 0 {
            tracing::warn!(
                feed_id = feed.id,
                skipped = parsed.skipped,
                "Skipped feed items without a link"
            );
        }
        let fetched = parsed.articles.len();

        let fresh = self.db.filter_new_articles(parsed.articles, feed).await?;
        let created = self.db.save_articles(feed.id, &fresh).await?;
        self.db.touch_feed(feed.id).await?;

        Ok((fetched, created))
    }
}
