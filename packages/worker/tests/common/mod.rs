#![allow(dead_code)]

use std::time::Duration;

use broker::{Broker, BrokerConfig, DbError, JobQueue, QueueError};
use task_core::StatusLabel;
use worker::WorkerConfig;

/// Connect a fresh in-memory broker. Every call gets its own datastore.
pub async fn setup_broker() -> Result<Broker, DbError> {
    Broker::connect(&BrokerConfig::memory()).await
}

/// Worker config with short timings for tests.
pub fn fast_config() -> WorkerConfig {
    WorkerConfig::default()
        .with_max_jobs(2)
        .with_poll_interval(Duration::from_millis(20))
        .with_job_timeout(Duration::from_secs(5))
        .with_shutdown_grace(Duration::from_secs(2))
}

/// Poll a job until it reaches a terminal state or `limit` elapses.
pub async fn wait_for_terminal(
    queue: &JobQueue,
    id: &str,
    limit: Duration,
) -> Result<StatusLabel, QueueError> {
    let deadline = tokio::time::Instant::now() + limit;
    let handle = queue.job(id);
    loop {
        let status = handle.status().await?;
        if status.is_terminal() || tokio::time::Instant::now() >= deadline {
            return Ok(status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Poll a job until it reads as `NotFound` or `limit` elapses.
pub async fn wait_for_not_found(
    queue: &JobQueue,
    id: &str,
    limit: Duration,
) -> Result<StatusLabel, QueueError> {
    let deadline = tokio::time::Instant::now() + limit;
    let handle = queue.job(id);
    loop {
        let status = handle.status().await?;
        if status == StatusLabel::NotFound || tokio::time::Instant::now() >= deadline {
            return Ok(status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
