//! Batch trigger and batch log handlers.

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::storage::BatchLogEntry;

use super::error::ApiResult;
use super::AppState;

/// Optional body of `POST /batch/execute`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBatchRequest {
    #[serde(default)]
    pub feed_ids: Option<Vec<i64>>,
}

/// Feeds a job targets: a count of requested ids, or every active feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFeeds {
    All,
    Count(usize),
}

impl Serialize for TargetFeeds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TargetFeeds::All => serializer.serialize_str("all"),
            TargetFeeds::Count(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBatchResponse {
    pub job_id: String,
    pub status: &'static str,
    pub target_feeds: TargetFeeds,
    pub started_at: DateTime<Utc>,
}

/// Queue a batch run and return its job id without waiting for it.
///
/// An empty body targets all active feeds.
pub async fn execute_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ExecuteBatchResponse>> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ExecuteBatchRequest::default()
    } else {
        serde_json::from_slice::<ExecuteBatchRequest>(&body)?
    };

    let target_feeds = match &request.feed_ids {
        Some(ids) => TargetFeeds::Count(ids.len()),
        None => TargetFeeds::All,
    };

    let handle = state.queue.submit(request.feed_ids).await?;

    Ok(Json(ExecuteBatchResponse {
        job_id: handle.job_id,
        status: "started",
        target_feeds,
        started_at: handle.submitted_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}

/// Default number of entries returned by `GET /batch/logs`
const DEFAULT_LOG_LIMIT: i64 = 50;

/// Most recent batch and per-feed log entries, newest first.
pub async fn get_batch_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<BatchLogEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let logs = state.db.recent_batch_logs(limit).await?;
    Ok(Json(logs))
}
