use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/batch/execute", post(handlers::execute_batch))
        .route("/batch/logs", get(handlers::get_batch_logs))
        .with_state(state)
}
