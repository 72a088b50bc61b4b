//! Worker error types.

use std::time::Duration;

use thiserror::Error;

use crate::handler::HandlerError;

/// Errors that stop the worker process.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The startup hook failed; no job was claimed.
    #[error("Startup hook failed: {0}")]
    Startup(String),
    #[error("Broker error: {0}")]
    Broker(#[from] broker::DbError),
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),
    #[error("Actor error: {0}")]
    Actor(String),
    #[error("Invalid worker config: {0}")]
    Config(String),
}

impl From<ractor::SpawnErr> for WorkerError {
    fn from(e: ractor::SpawnErr) -> Self {
        WorkerError::Actor(e.to_string())
    }
}

/// Why a claimed job ended in `Failed`.
///
/// The `Display` text is what gets stored as the job's error.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("No handler registered for function: {0}")]
    HandlerNotFound(String),
    #[error("{0}")]
    Handler(#[from] HandlerError),
    #[error("Handler panicked: {0}")]
    Panicked(String),
    #[error("Job timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Job was cancelled")]
    Cancelled,
    #[error("Exceeded max tries ({attempts} attempts)")]
    MaxTriesExceeded { attempts: u32 },
}
