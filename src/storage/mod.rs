mod batch_logs;
mod bookmarks;
mod feeds;
mod history;
mod jobs;
mod schema;
mod types;

pub use batch_logs::MAX_LOG_LIMIT;
pub use schema::Database;
pub use types::{
    Article, BatchJob, BatchLogCompletion, BatchLogEntry, BatchStatus, Bookmark, DatabaseError,
    Feed, FeedHistoryItem, FeedLogRecord, JobStatus, BATCH_FEED_ID,
};
