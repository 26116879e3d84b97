//! HTTP trigger for manual batch runs.

mod error;
mod handlers;
mod router;

pub use error::{ApiError, ApiResult};
pub use handlers::{ExecuteBatchRequest, ExecuteBatchResponse, TargetFeeds};
pub use router::create_router;

use crate::batch::JobQueue;
use crate::storage::Database;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(db: Database, queue: JobQueue) -> Self {
        Self { db, queue }
    }
}
