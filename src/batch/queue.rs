//! Persisted batch job queue.
//!
//! Jobs are written to `batch_jobs` before they are handed to the worker, so
//! a job accepted by [`JobQueue::submit`] survives a crash: on the next
//! start, [`JobQueue::resume_unfinished`] puts it back on the queue. A single
//! worker drains the queue, which keeps batch runs from overlapping.
//!
//! `submit` never waits on the worker. When the channel is full the job stays
//! `queued` in the table and the worker picks it up from there once the
//! channel runs dry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;

use crate::storage::{Database, DatabaseError};

use super::runner::BatchRunner;

/// Jobs held in the channel; overflow waits in the table
const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Job queue worker is not running")]
    Closed,
}

/// Returned to the caller as soon as a job is accepted
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: String,
    pub submitted_at: DateTime<Utc>,
}

/// Jobs persisted while the channel was full
#[derive(Default)]
struct Backlog {
    pending: AtomicBool,
    wake: Notify,
}

struct QueuedJob {
    id: String,
    feed_ids: Option<Vec<i64>>,
}

/// Handle for submitting jobs to the batch worker
#[derive(Clone)]
pub struct JobQueue {
    db: Database,
    sender: mpsc::Sender<QueuedJob>,
    backlog: Arc<Backlog>,
}

impl JobQueue {
    /// Start the worker task and return a handle to it.
    ///
    /// The worker stops once every handle has been dropped.
    pub fn spawn(runner: BatchRunner) -> Self {
        Self::with_capacity(runner, QUEUE_CAPACITY)
    }

    pub(crate) fn with_capacity(runner: BatchRunner, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let db = runner.db().clone();
        let backlog = Arc::new(Backlog::default());

        let worker = JobWorker {
            runner,
            receiver,
            backlog: backlog.clone(),
        };
        tokio::spawn(worker.run());

        Self {
            db,
            sender,
            backlog,
        }
    }

    /// Persist a job for `feed_ids` (all active feeds when `None`) and queue it.
    pub async fn submit(&self, feed_ids: Option<Vec<i64>>) -> Result<JobHandle, QueueError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let submitted_at = Utc::now();

        self.db.insert_job(&job_id, feed_ids.as_deref()).await?;
        self.offer(QueuedJob {
            id: job_id.clone(),
            feed_ids,
        })?;

        tracing::info!(job_id = %job_id, "Batch job queued");
        Ok(JobHandle {
            job_id,
            submitted_at,
        })
    }

    /// Re-queue jobs a previous process accepted but never finished.
    ///
    /// Returns how many jobs were re-queued.
    pub async fn resume_unfinished(&self) -> Result<usize, QueueError> {
        let jobs = self.db.unfinished_jobs().await?;
        let count = jobs.len();

        for job in jobs {
            tracing::info!(job_id = %job.id, status = job.status.as_str(), "Resuming batch job");
            self.offer(QueuedJob {
                id: job.id,
                feed_ids: job.feed_ids,
            })?;
        }

        Ok(count)
    }

    /// Hand a persisted job to the worker without waiting. A full channel
    /// leaves the job in the table and flags the backlog.
    fn offer(&self, job: QueuedJob) -> Result<(), QueueError> {
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                tracing::warn!(job_id = %job.id, "Job channel full, job left in the backlog");
                self.backlog.pending.store(true, Ordering::Release);
                self.backlog.wake.notify_one();
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }
}

struct JobWorker {
    runner: BatchRunner,
    receiver: mpsc::Receiver<QueuedJob>,
    backlog: Arc<Backlog>,
}

impl JobWorker {
    async fn run(mut self) {
        loop {
            let next = tokio::select! {
                job = self.receiver.recv() => Some(job),
                _ = self.backlog.wake.notified() => None,
            };
            match next {
                Some(Some(job)) => self.execute(job).await,
                Some(None) => break,
                None => {}
            }
            if self.receiver.is_empty() && self.backlog.pending.swap(false, Ordering::AcqRel) {
                self.drain_backlog().await;
            }
        }
        tracing::info!("Job queue worker stopped");
    }

    /// Run jobs that were persisted but never made it into the channel.
    async fn drain_backlog(&self) {
        let jobs = match self.runner.db().unfinished_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load backlogged jobs");
                return;
            }
        };
        tracing::info!(jobs = jobs.len(), "Draining job backlog");
        for job in jobs {
            self.execute(QueuedJob {
                id: job.id,
                feed_ids: job.feed_ids,
            })
            .await;
        }
    }

    async fn execute(&self, job: QueuedJob) {
        let db = self.runner.db();

        // A backlogged job can also still be in the channel; run it once.
        match db.claim_job(&job.id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(job_id = %job.id, "Job already finished, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to mark job running");
            }
        }

        // Batch-level failures are already in the batch log.
        if let Err(e) = self.runner.run(Some(&job.id), job.feed_ids.as_deref()).await {
            tracing::error!(job_id = %job.id, error = %e, "Batch job failed");
        }

        if let Err(e) = db.mark_job_done(&job.id).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to mark job done");
        }
    }
}
