//! Functions this worker serves and its startup/shutdown hooks.

use std::time::Instant;

use broker::Broker;
use serde_json::json;
use storage::{Storage, StorageError};

use crate::error::WorkerError;
use crate::handler::{HandlerError, HandlerRegistry, HandlerResult, JobContext};
use crate::settings::{WorkerConfig, WorkerSettings};

pub use task_core::SAMPLE_BACKGROUND_TASK;

/// Shared state handed to every job.
pub struct WorkerState {
    pub storage: Storage,
    pub started: Instant,
}

/// The function table.
pub fn functions() -> HandlerRegistry<WorkerState> {
    HandlerRegistry::new().with_fn(SAMPLE_BACKGROUND_TASK, sample_background_task)
}

/// Full worker settings over the given document storage.
pub fn settings(config: WorkerConfig, storage: Storage) -> WorkerSettings<WorkerState> {
    WorkerSettings::new(config, functions(), move |broker| startup(broker, storage))
        .on_shutdown(|state| async move {
            tracing::info!(
                "Worker state released after {:?}",
                state.started.elapsed()
            );
        })
}

async fn startup(broker: Broker, storage: Storage) -> Result<WorkerState, WorkerError> {
    if !broker.is_connected() {
        return Err(WorkerError::Startup("broker is not connected".into()));
    }
    tracing::info!("Worker state ready ({} document storage)", storage.kind_str());
    Ok(WorkerState {
        storage,
        started: Instant::now(),
    })
}

/// Process one stored document.
///
/// Args: `[filename]`. Fails when the document is not in storage.
pub async fn sample_background_task(ctx: JobContext<WorkerState>) -> HandlerResult {
    let filename: String = ctx.arg(0)?;
    let filename = filename.trim().to_string();
    if filename.is_empty() {
        return Err(HandlerError::InvalidArgument {
            index: 0,
            reason: "filename is empty".into(),
        });
    }

    tracing::info!("Processing document {} (job {})", filename, ctx.job_id);

    let bytes = ctx
        .state
        .storage
        .get_bytes(&filename)
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => {
                HandlerError::failed(format!("Document {filename} not found"))
            }
            other => HandlerError::failed(format!("Could not read {filename}: {other}")),
        })?;

    Ok(json!({
        "filename": filename,
        "size_bytes": bytes.len(),
        "message": format!("Task {filename} is complete!"),
    }))
}
