use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("Database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A status column held a value outside its enum
    #[error("Unknown status value in database: {0}")]
    UnknownStatus(String),

    /// A stored JSON column could not be encoded or decoded
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Timestamp helpers
// ============================================================================

/// Timestamps are stored as INTEGER unix milliseconds.
pub(crate) fn to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// ============================================================================
// Parsed (transient) types
// ============================================================================

/// An article as produced by the feed parser.
///
/// Never persisted directly: it feeds deduplication, then becomes a
/// bookmark plus a feed history row.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub guid: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
}

// ============================================================================
// Row types
// ============================================================================

/// Row type for `rss_feeds` queries
pub(crate) type FeedRow = (i64, String, String, bool, Option<i64>, i64, i64);

/// A subscribed feed.
///
/// `display_name` uses `Arc<str>` so per-feed tasks can carry it into
/// log fields without reallocating.
#[derive(Debug, Clone)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub display_name: Arc<str>,
    pub is_active: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    pub(crate) fn from_row(row: FeedRow) -> Self {
        let (id, url, display_name, is_active, last_fetched_at, created_at, updated_at) = row;
        Feed {
            id,
            url,
            display_name: Arc::from(display_name),
            is_active,
            last_fetched_at: last_fetched_at.map(from_millis),
            created_at: from_millis(created_at),
            updated_at: from_millis(updated_at),
        }
    }
}

/// A stored bookmark
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookmarkDbRow {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub is_read: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BookmarkDbRow {
    pub(crate) fn into_bookmark(self) -> Bookmark {
        Bookmark {
            id: self.id,
            url: self.url,
            title: self.title,
            is_read: self.is_read,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        }
    }
}

/// One ingested article per feed; the durable dedup ledger.
#[derive(Debug, Clone)]
pub struct FeedHistoryItem {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedHistoryDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
}

impl FeedHistoryDbRow {
    pub(crate) fn into_item(self) -> FeedHistoryItem {
        FeedHistoryItem {
            id: self.id,
            feed_id: self.feed_id,
            guid: self.guid,
            url: self.url,
            title: self.title,
            description: self.description,
            published_at: self.published_at.map(from_millis),
        }
    }
}

// ============================================================================
// Batch log
// ============================================================================

/// Feed id used by whole-batch log rows
pub const BATCH_FEED_ID: i64 = 0;

/// Status of a batch log entry.
///
/// `Success` is the "completed" state of a whole-batch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Success,
    Error,
    PartialFailure,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Success => "success",
            BatchStatus::Error => "error",
            BatchStatus::PartialFailure => "partial_failure",
        }
    }

    /// Derive the whole-batch status from per-feed outcomes.
    ///
    /// A run with any failed feed is never `Success`. A run with no feeds at
    /// all is `Success`.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => BatchStatus::Success,
            (0, _) => BatchStatus::Error,
            _ => BatchStatus::PartialFailure,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(BatchStatus::InProgress),
            "success" => Ok(BatchStatus::Success),
            "error" => Ok(BatchStatus::Error),
            "partial_failure" => Ok(BatchStatus::PartialFailure),
            other => Err(DatabaseError::UnknownStatus(other.to_string())),
        }
    }
}

/// A row of `rss_batch_logs`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLogEntry {
    pub id: i64,
    pub job_id: Option<String>,
    pub feed_id: i64,
    pub status: BatchStatus,
    pub items_fetched: i64,
    pub items_created: i64,
    pub feeds_total: i64,
    pub feeds_succeeded: i64,
    pub feeds_failed: i64,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchLogEntry {
    pub fn is_batch(&self) -> bool {
        self.feed_id == BATCH_FEED_ID
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BatchLogDbRow {
    pub id: i64,
    pub job_id: Option<String>,
    pub feed_id: i64,
    pub status: String,
    pub items_fetched: i64,
    pub items_created: i64,
    pub feeds_total: i64,
    pub feeds_succeeded: i64,
    pub feeds_failed: i64,
    pub error_message: Option<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

impl BatchLogDbRow {
    pub(crate) fn into_entry(self) -> Result<BatchLogEntry, DatabaseError> {
        Ok(BatchLogEntry {
            id: self.id,
            job_id: self.job_id,
            feed_id: self.feed_id,
            status: self.status.parse()?,
            items_fetched: self.items_fetched,
            items_created: self.items_created,
            feeds_total: self.feeds_total,
            feeds_succeeded: self.feeds_succeeded,
            feeds_failed: self.feeds_failed,
            error_message: self.error_message,
            started_at: from_millis(self.started_at),
            finished_at: self.finished_at.map(from_millis),
        })
    }
}

/// Values written when a per-feed attempt finishes
#[derive(Debug, Clone)]
pub struct FeedLogRecord {
    pub feed_id: i64,
    pub status: BatchStatus,
    pub items_fetched: usize,
    pub items_created: usize,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Aggregate values written when a whole batch finishes
#[derive(Debug, Clone)]
pub struct BatchLogCompletion {
    pub status: BatchStatus,
    pub items_fetched: usize,
    pub items_created: usize,
    pub feeds_total: usize,
    pub feeds_succeeded: usize,
    pub feeds_failed: usize,
    pub error_message: Option<String>,
    pub finished_at: DateTime<Utc>,
}

// ============================================================================
// Batch jobs
// ============================================================================

/// Lifecycle of a queued batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
        }
    }
}

impl FromStr for JobStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            other => Err(DatabaseError::UnknownStatus(other.to_string())),
        }
    }
}

/// A persisted batch job. `feed_ids == None` targets every active feed.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: String,
    pub feed_ids: Option<Vec<i64>>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BatchJobDbRow {
    pub id: String,
    pub feed_ids: Option<String>,
    pub status: String,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl BatchJobDbRow {
    pub(crate) fn into_job(self) -> Result<BatchJob, DatabaseError> {
        let feed_ids = match self.feed_ids {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                DatabaseError::InvalidData(format!("feed_ids of job {}: {e}", self.id))
            })?),
            None => None,
        };
        Ok(BatchJob {
            id: self.id,
            feed_ids,
            status: self.status.parse()?,
            created_at: from_millis(self.created_at),
            started_at: self.started_at.map(from_millis),
            finished_at: self.finished_at.map(from_millis),
        })
    }
}
