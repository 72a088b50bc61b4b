use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use task_core::SAMPLE_BACKGROUND_TASK;

use broker::QueueError;

use crate::error::ApiError;
use crate::state::AppState;
use crate::view::JobView;

#[derive(Debug, Deserialize)]
pub struct CreateTaskParams {
    filename: String,
}

/// Enqueue the document task and answer with the new job id.
pub async fn create_task(
    State(state): State<AppState>,
    Query(params): Query<CreateTaskParams>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !state.queue.is_available() {
        return Err(ApiError::QueueUnavailable);
    }

    let handle = state
        .queue
        .enqueue(SAMPLE_BACKGROUND_TASK, vec![json!(params.filename)])
        .await
        .map_err(|e| match e {
            QueueError::BrokerUnavailable => ApiError::QueueUnavailable,
            other => {
                tracing::error!("Failed to create task for {}: {}", params.filename, other);
                ApiError::TaskCreation
            }
        })?;

    tracing::info!("Created task {} for {}", handle.id(), params.filename);

    Ok((StatusCode::CREATED, Json(json!({ "id": handle.id() }))))
}

pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    lookup(&state, task_id).await
}

/// `GET /tasks/task` without an id: always the not-found view.
pub async fn blank_task_status(State(state): State<AppState>) -> Result<Json<JobView>, ApiError> {
    lookup(&state, String::new()).await
}

async fn lookup(state: &AppState, task_id: String) -> Result<Json<JobView>, ApiError> {
    if !state.queue.is_available() {
        return Err(ApiError::QueueUnavailable);
    }

    let info = state.queue.job(task_id.as_str()).info().await.map_err(|e| match e {
        QueueError::BrokerUnavailable => ApiError::QueueUnavailable,
        other => {
            tracing::error!("Failed to read task {}: {}", task_id, other);
            ApiError::TaskLookup
        }
    })?;

    Ok(Json(JobView::new(task_id, info)))
}
