//! Batch ingestion: orchestration, logging, job queue and scheduling.
//!
//! - [`runner`] - runs one batch over the active feeds
//! - [`logger`] - writes `rss_batch_logs` rows, never failing the batch
//! - [`queue`] - persisted job queue with a single worker
//! - [`scheduler`] - periodic trigger feeding the queue

mod logger;
mod queue;
mod runner;
mod scheduler;

pub use logger::BatchLogger;
pub use queue::{JobHandle, JobQueue, QueueError};
pub use runner::{BatchRunner, BatchSummary, FeedOutcome, IngestError, DEFAULT_CHUNK_SIZE};
pub use scheduler::{spawn_scheduler, SchedulerHandle};
