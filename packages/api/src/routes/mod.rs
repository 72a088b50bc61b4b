mod health;
mod search;
mod stats;
mod tasks;

pub use health::health;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
pub fn api_router(state: AppState) -> Router<AppState> {
    // Only task creation is rate limited.
    let task = post(tasks::create_task)
        .route_layer(from_fn_with_state(state, rate_limit_middleware))
        .get(tasks::blank_task_status);

    Router::new()
        .route("/tasks/task", task)
        .route("/tasks/task/{task_id}", get(tasks::task_status))
        .route("/search", post(search::search))
        .route("/docs", post(search::documents))
        .route("/doc/{sentence_num}", post(search::document))
        .route("/general_stats", post(stats::general_stats))
        .route("/per_country_stats", post(stats::per_country_stats))
        .route("/per_document_stats", post(stats::per_document_stats))
}
