//! Job queue client: submit named jobs and look them up by id.

use std::time::Duration;

use chrono::Utc;
use task_core::{Job, JobId, StatusLabel};
use thiserror::Error;

use crate::repositories::JobRepository;
use crate::Broker;

/// Queue used when none is configured.
pub const DEFAULT_QUEUE_NAME: &str = "default";

/// Errors surfaced by the queue client.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No broker connection is held. Retry later.
    #[error("Queue is not available")]
    BrokerUnavailable,
    /// The broker rejected or failed to store the job.
    #[error("Failed to enqueue job: {0}")]
    EnqueueFailed(String),
    /// The broker failed while reading a job.
    #[error("Failed to read job: {0}")]
    Lookup(String),
}

/// Per-call enqueue settings.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Caller-chosen id. Enqueue fails if a job with this id exists.
    pub job_id: Option<JobId>,
    /// Do not let workers claim the job before this delay elapsed.
    pub defer_by: Option<Duration>,
    /// Queue to submit to instead of the client's queue.
    pub queue_name: Option<String>,
}

impl EnqueueOptions {
    pub fn with_job_id(mut self, id: JobId) -> Self {
        self.job_id = Some(id);
        self
    }

    pub fn with_defer_by(mut self, delay: Duration) -> Self {
        self.defer_by = Some(delay);
        self
    }

    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }
}

/// Client for submitting jobs to the broker.
#[derive(Debug, Clone)]
pub struct JobQueue {
    broker: Broker,
    queue_name: String,
}

impl JobQueue {
    /// Create a client for the default queue.
    pub fn new(broker: Broker) -> Self {
        Self {
            broker,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
        }
    }

    /// Submit to another queue.
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Whether the broker connection is currently held.
    pub fn is_available(&self) -> bool {
        self.broker.is_connected()
    }

    /// Enqueue `function(args...)` and return without waiting for execution.
    pub async fn enqueue(
        &self,
        function: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<JobHandle, QueueError> {
        self.enqueue_with(function, args, EnqueueOptions::default())
            .await
    }

    /// Enqueue with explicit options.
    pub async fn enqueue_with(
        &self,
        function: &str,
        args: Vec<serde_json::Value>,
        options: EnqueueOptions,
    ) -> Result<JobHandle, QueueError> {
        let db = self
            .broker
            .get()
            .map_err(|_| QueueError::BrokerUnavailable)?;

        let function = function.trim();
        if function.is_empty() {
            return Err(QueueError::EnqueueFailed("function name is empty".into()));
        }

        let queue_name = options
            .queue_name
            .unwrap_or_else(|| self.queue_name.clone());
        let mut job = Job::new(queue_name, function, args);
        if let Some(id) = options.job_id {
            job = job.with_id(id);
        }

        let defer_ms = options
            .defer_by
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        let score_ms = Utc::now().timestamp_millis().saturating_add(defer_ms);

        let job = JobRepository::new(db)
            .create(&job, score_ms)
            .await
            .map_err(|e| {
                if e.is_unavailable() {
                    QueueError::BrokerUnavailable
                } else {
                    QueueError::EnqueueFailed(e.to_string())
                }
            })?;

        tracing::debug!(
            "Enqueued job {} ({}) on {}",
            job.id,
            job.function,
            job.queue_name
        );

        Ok(JobHandle {
            id: job.id.to_string(),
            broker: self.broker.clone(),
        })
    }

    /// Handle for a job id, known or not.
    pub fn job(&self, id: impl Into<String>) -> JobHandle {
        JobHandle {
            id: id.into(),
            broker: self.broker.clone(),
        }
    }
}

/// Reference to a job by id.
///
/// Returned by enqueue and built from ids received over the API. Lookups go
/// to the same job store the workers write to.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: String,
    broker: Broker,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current job record, or `None` if the broker does not know the id.
    pub async fn info(&self) -> Result<Option<Job>, QueueError> {
        let db = self
            .broker
            .get()
            .map_err(|_| QueueError::BrokerUnavailable)?;

        // Blank or malformed ids can never have been issued.
        let Ok(id) = JobId::parse(&self.id) else {
            return Ok(None);
        };

        JobRepository::new(db)
            .get(&id)
            .await
            .map_err(|e| {
                if e.is_unavailable() {
                    QueueError::BrokerUnavailable
                } else {
                    QueueError::Lookup(e.to_string())
                }
            })
    }

    /// Current status label; `NotFound` for unknown ids.
    pub async fn status(&self) -> Result<StatusLabel, QueueError> {
        Ok(self
            .info()
            .await?
            .map_or(StatusLabel::NotFound, |job| job.status.label()))
    }
}
