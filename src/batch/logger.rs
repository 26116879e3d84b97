use chrono::Utc;

use crate::storage::{BatchLogCompletion, BatchStatus, Database, FeedLogRecord};

use super::runner::{BatchSummary, FeedOutcome};

/// Writes batch and per-feed rows to `rss_batch_logs`.
///
/// Every method swallows its own database failure. A log row that cannot be
/// written is reported through `tracing::error!` and otherwise ignored, so
/// logging never changes the outcome of the run being logged.
#[derive(Clone)]
pub struct BatchLogger {
    db: Database,
}

impl BatchLogger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the whole-batch row in `in_progress` state.
    ///
    /// Returns `None` if the row could not be written.
    pub async fn log_batch_start(&self, job_id: Option<&str>) -> Option<i64> {
        match self.db.insert_batch_start(job_id, Utc::now()).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(job_id = ?job_id, error = %e, "Failed to write batch start log");
                None
            }
        }
    }

    /// Close the whole-batch row with aggregate counts and the derived status.
    pub async fn log_batch_complete(&self, log_id: Option<i64>, summary: &BatchSummary) {
        let Some(log_id) = log_id else {
            tracing::error!(
                status = %summary.status,
                feeds_total = summary.feeds_total,
                "No batch start log to complete"
            );
            return;
        };

        let completion = BatchLogCompletion {
            status: summary.status,
            items_fetched: summary.items_fetched,
            items_created: summary.items_created,
            feeds_total: summary.feeds_total,
            feeds_succeeded: summary.feeds_succeeded,
            feeds_failed: summary.feeds_failed,
            error_message: None,
            finished_at: Utc::now(),
        };

        if let Err(e) = self.db.complete_batch_log(log_id, &completion).await {
            tracing::error!(log_id = log_id, error = %e, "Failed to write batch completion log");
        }
    }

    /// Mark the whole batch as failed.
    ///
    /// When the start row was never written a finished `error` row is
    /// inserted instead, so the failure is still recorded.
    pub async fn log_batch_error(&self, log_id: Option<i64>, job_id: Option<&str>, message: &str) {
        let now = Utc::now();
        let completion = BatchLogCompletion {
            status: BatchStatus::Error,
            items_fetched: 0,
            items_created: 0,
            feeds_total: 0,
            feeds_succeeded: 0,
            feeds_failed: 0,
            error_message: Some(message.to_string()),
            finished_at: now,
        };

        let result = match log_id {
            Some(log_id) => self.db.complete_batch_log(log_id, &completion).await,
            None => self
                .db
                .insert_batch_log(job_id, now, &completion)
                .await
                .map(|_| ()),
        };

        if let Err(e) = result {
            tracing::error!(
                job_id = ?job_id,
                batch_error = %message,
                error = %e,
                "Failed to write batch error log"
            );
        }
    }

    /// Record the outcome of one feed.
    pub async fn log_feed_process(&self, job_id: Option<&str>, feed_id: i64, outcome: &FeedOutcome) {
        let record = FeedLogRecord {
            feed_id,
            status: if outcome.is_success() {
                BatchStatus::Success
            } else {
                BatchStatus::Error
            },
            items_fetched: outcome.items_fetched,
            items_created: outcome.items_created,
            error_message: outcome.error.clone(),
            started_at: outcome.started_at,
            finished_at: outcome.finished_at,
        };

        if let Err(e) = self.db.insert_feed_log(job_id, &record).await {
            tracing::error!(feed_id = feed_id, error = %e, "Failed to write feed log");
        }
    }
}
