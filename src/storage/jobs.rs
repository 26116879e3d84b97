use chrono::Utc;

use super::schema::Database;
use super::types::{to_millis, BatchJob, BatchJobDbRow, DatabaseError, JobStatus};

const JOB_COLUMNS: &str = "id, feed_ids, status, created_at, started_at, finished_at";

impl Database {
    // ========================================================================
    // Batch Job Queue
    // ========================================================================

    /// Persist a queued job. `feed_ids == None` targets all active feeds.
    pub async fn insert_job(
        &self,
        job_id: &str,
        feed_ids: Option<&[i64]>,
    ) -> Result<(), DatabaseError> {
        let feed_ids = feed_ids
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::InvalidData(e.to_string()))?;

        sqlx::query(
            "INSERT INTO batch_jobs (id, feed_ids, status, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(job_id)
        .bind(feed_ids)
        .bind(JobStatus::Queued.as_str())
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a job running. Returns `false` (and changes nothing) when the
    /// job is unknown or already done.
    pub async fn claim_job(&self, job_id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE batch_jobs SET status = ?, started_at = ? WHERE id = ? AND status != ?",
        )
        .bind(JobStatus::Running.as_str())
        .bind(to_millis(Utc::now()))
        .bind(job_id)
        .bind(JobStatus::Done.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_job_done(&self, job_id: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE batch_jobs SET status = ?, finished_at = ? WHERE id = ?")
            .bind(JobStatus::Done.as_str())
            .bind(to_millis(Utc::now()))
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<BatchJob>, DatabaseError> {
        let row = sqlx::query_as::<_, BatchJobDbRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM batch_jobs WHERE id = ?"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(BatchJobDbRow::into_job).transpose()
    }

    /// Jobs a previous process left queued or running, oldest first
    pub async fn unfinished_jobs(&self) -> Result<Vec<BatchJob>, DatabaseError> {
        let rows = sqlx::query_as::<_, BatchJobDbRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM batch_jobs WHERE status != ? ORDER BY created_at, id"
        ))
        .bind(JobStatus::Done.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BatchJobDbRow::into_job).collect()
    }
}
