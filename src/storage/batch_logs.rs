use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{
    to_millis, BatchLogCompletion, BatchLogDbRow, BatchLogEntry, BatchStatus, DatabaseError,
    FeedLogRecord, BATCH_FEED_ID,
};

/// Maximum rows returned by a single log listing
pub const MAX_LOG_LIMIT: i64 = 500;

const LOG_COLUMNS: &str = "id, job_id, feed_id, status, items_fetched, items_created, \
     feeds_total, feeds_succeeded, feeds_failed, error_message, started_at, finished_at";

impl Database {
    // ========================================================================
    // Batch Log Writes
    // ========================================================================

    /// Insert the `in_progress` whole-batch row, returning its id
    pub async fn insert_batch_start(
        &self,
        job_id: Option<&str>,
        started_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO rss_batch_logs (job_id, feed_id, status, started_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(job_id)
        .bind(BATCH_FEED_ID)
        .bind(BatchStatus::InProgress.as_str())
        .bind(to_millis(started_at))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Finalize a whole-batch row with aggregate counts
    pub async fn complete_batch_log(
        &self,
        log_id: i64,
        completion: &BatchLogCompletion,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE rss_batch_logs
            SET status = ?, items_fetched = ?, items_created = ?,
                feeds_total = ?, feeds_succeeded = ?, feeds_failed = ?,
                error_message = ?, finished_at = ?
            WHERE id = ?
        "#,
        )
        .bind(completion.status.as_str())
        .bind(completion.items_fetched as i64)
        .bind(completion.items_created as i64)
        .bind(completion.feeds_total as i64)
        .bind(completion.feeds_succeeded as i64)
        .bind(completion.feeds_failed as i64)
        .bind(&completion.error_message)
        .bind(to_millis(completion.finished_at))
        .bind(log_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::Other(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    /// Insert a finished whole-batch row in one step.
    ///
    /// Used when the run fails before (or while) its start row could be written.
    pub async fn insert_batch_log(
        &self,
        job_id: Option<&str>,
        started_at: DateTime<Utc>,
        completion: &BatchLogCompletion,
    ) -> Result<i64, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO rss_batch_logs
                (job_id, feed_id, status, items_fetched, items_created,
                 feeds_total, feeds_succeeded, feeds_failed, error_message,
                 started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(job_id)
        .bind(BATCH_FEED_ID)
        .bind(completion.status.as_str())
        .bind(completion.items_fetched as i64)
        .bind(completion.items_created as i64)
        .bind(completion.feeds_total as i64)
        .bind(completion.feeds_succeeded as i64)
        .bind(completion.feeds_failed as i64)
        .bind(&completion.error_message)
        .bind(to_millis(started_at))
        .bind(to_millis(completion.finished_at))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert the outcome row of one feed attempt
    pub async fn insert_feed_log(
        &self,
        job_id: Option<&str>,
        record: &FeedLogRecord,
    ) -> Result<i64, DatabaseError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO rss_batch_logs
                (job_id, feed_id, status, items_fetched, items_created,
                 error_message, started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(job_id)
        .bind(record.feed_id)
        .bind(record.status.as_str())
        .bind(record.items_fetched as i64)
        .bind(record.items_created as i64)
        .bind(&record.error_message)
        .bind(to_millis(record.started_at))
        .bind(to_millis(record.finished_at))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    // ========================================================================
    // Batch Log Queries
    // ========================================================================

    /// Most recent log rows first, capped at [`MAX_LOG_LIMIT`]
    pub async fn recent_batch_logs(&self, limit: i64) -> Result<Vec<BatchLogEntry>, DatabaseError> {
        let limit = limit.clamp(1, MAX_LOG_LIMIT);
        let rows = sqlx::query_as::<_, BatchLogDbRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM rss_batch_logs ORDER BY started_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BatchLogDbRow::into_entry).collect()
    }

    /// All rows written by one job, batch row first, then feeds by id
    pub async fn batch_logs_for_job(
        &self,
        job_id: &str,
    ) -> Result<Vec<BatchLogEntry>, DatabaseError> {
        let rows = sqlx::query_as::<_, BatchLogDbRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM rss_batch_logs WHERE job_id = ? ORDER BY feed_id, id"
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BatchLogDbRow::into_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{BatchLogCompletion, BatchStatus, Database, FeedLogRecord};
    use chrono::Utc;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn completion(status: BatchStatus) -> BatchLogCompletion {
        BatchLogCompletion {
            status,
            items_fetched: 5,
            items_created: 3,
            feeds_total: 2,
            feeds_succeeded: 1,
            feeds_failed: 1,
            error_message: None,
            finished_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_batch_start_then_complete() {
        let db = test_db().await;
        let id = db.insert_batch_start(Some("job-1"), Utc::now()).await.unwrap();

        let logs = db.batch_logs_for_job("job-1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, BatchStatus::InProgress);
        assert!(logs[0].is_batch());
        assert!(logs[0].finished_at.is_none());

        db.complete_batch_log(id, &completion(BatchStatus::PartialFailure))
            .await
            .unwrap();

        let logs = db.batch_logs_for_job("job-1").await.unwrap();
        assert_eq!(logs[0].status, BatchStatus::PartialFailure);
        assert_eq!(logs[0].items_fetched, 5);
        assert_eq!(logs[0].items_created, 3);
        assert_eq!(logs[0].feeds_failed, 1);
        assert!(logs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_complete_unknown_log_errors() {
        let db = test_db().await;
        assert!(db
            .complete_batch_log(77, &completion(BatchStatus::Success))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_feed_log_rows_follow_batch_row() {
        let db = test_db().await;
        db.insert_batch_start(Some("job-2"), Utc::now()).await.unwrap();
        db.insert_feed_log(
            Some("job-2"),
            &FeedLogRecord {
                feed_id: 7,
                status: BatchStatus::Error,
                items_fetched: 0,
                items_created: 0,
                error_message: Some("HTTP error: status 500".to_string()),
                started_at: Utc::now(),
                finished_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let logs = db.batch_logs_for_job("job-2").await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].is_batch());
        assert_eq!(logs[1].feed_id, 7);
        assert_eq!(
            logs[1].error_message.as_deref(),
            Some("HTTP error: status 500")
        );
    }

    #[tokio::test]
    async fn test_recent_batch_logs_limit() {
        let db = test_db().await;
        for _ in 0..5 {
            db.insert_batch_log(None, Utc::now(), &completion(BatchStatus::Success))
                .await
                .unwrap();
        }
        assert_eq!(db.recent_batch_logs(3).await.unwrap().len(), 3);
        assert_eq!(db.recent_batch_logs(0).await.unwrap().len(), 1);
        assert_eq!(db.recent_batch_logs(10_000).await.unwrap().len(), 5);
    }
}
