//! Periodic trigger for "all feeds" batch jobs.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::queue::JobQueue;

enum Message {
    Shutdown,
}

/// Handle for stopping the scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<Message>,
}

impl SchedulerHandle {
    pub async fn shutdown(&self) {
        let _ = self.sender.send(Message::Shutdown).await;
    }
}

struct Scheduler {
    queue: JobQueue,
    interval: Duration,
    receiver: mpsc::Receiver<Message>,
}

impl Scheduler {
    async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip first tick (immediate)
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.execute().await;
                }
                msg = self.receiver.recv() => {
                    match msg {
                        Some(Message::Shutdown) | None => {
                            tracing::info!("Batch scheduler stopped");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn execute(&self) {
        match self.queue.submit(None).await {
            Ok(handle) => tracing::debug!(job_id = %handle.job_id, "Scheduled batch submitted"),
            Err(e) => tracing::error!(error = %e, "Failed to submit scheduled batch"),
        }
    }
}

/// Submit an all-feeds job every `interval`, starting one interval from now.
///
/// Returns `None` when `interval` is zero, which disables scheduling.
pub fn spawn_scheduler(queue: JobQueue, interval: Duration) -> Option<SchedulerHandle> {
    if interval.is_zero() {
        tracing::info!("Batch scheduler disabled");
        return None;
    }

    let (sender, receiver) = mpsc::channel(8);
    let scheduler = Scheduler {
        queue,
        interval,
        receiver,
    };
    tokio::spawn(scheduler.run());

    tracing::info!(interval_secs = interval.as_secs(), "Batch scheduler started");
    Some(SchedulerHandle { sender })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchRunner;
    use crate::feed::FeedFetcher;
    use crate::storage::Database;

    async fn queue() -> (Database, JobQueue) {
        let db = Database::open(":memory:").await.unwrap();
        let fetcher = FeedFetcher::new("shelf-test/1.0", 1024 * 1024).unwrap();
        let runner = BatchRunner::new(db.clone(), fetcher, 10);
        (db, JobQueue::spawn(runner))
    }

    #[tokio::test]
    async fn test_zero_interval_disables_scheduler() {
        let (_db, queue) = queue().await;
        assert!(spawn_scheduler(queue, Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_scheduler_submits_batches_until_shutdown() {
        let (db, queue) = queue().await;
        let handle = spawn_scheduler(queue, Duration::from_millis(20)).unwrap();

        let mut batches = 0;
        for _ in 0..200 {
            batches = db.recent_batch_logs(10).await.unwrap().len();
            if batches > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(batches > 0, "scheduler never submitted a batch");

        handle.shutdown().await;
    }
}
