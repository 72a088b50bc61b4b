//! Job domain types for units of asynchronous work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Longest identifier accepted from callers.
const MAX_ID_LEN: usize = 128;

/// Unique identifier for a job.
///
/// Generated ids are ULIDs, so they sort by creation time. Callers may also
/// supply their own id at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

/// Rejected job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidJobId {
    #[error("job id is empty")]
    Empty,
    #[error("job id is longer than {MAX_ID_LEN} characters")]
    TooLong,
    #[error("job id contains invalid character {0:?}")]
    InvalidChar(char),
}

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Parse a job ID from a string.
    ///
    /// Accepts ASCII letters, digits, `-` and `_`. Surrounding whitespace is
    /// ignored.
    pub fn parse(s: &str) -> Result<Self, InvalidJobId> {
        let s = s.trim();
        if s.is_empty() {
            return Err(InvalidJobId::Empty);
        }
        if s.len() > MAX_ID_LEN {
            return Err(InvalidJobId::TooLong);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(InvalidJobId::InvalidChar(c));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// Terminal variants carry their outcome, so a result and an error can never
/// be present at the same time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting to be claimed by a worker.
    #[default]
    Queued,
    /// Job was claimed and is being executed.
    Running {
        started_at: DateTime<Utc>,
        worker_id: String,
    },
    /// Handler returned normally.
    Complete {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        result: serde_json::Value,
    },
    /// Handler failed, panicked, timed out or was never found.
    Failed {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: String,
    },
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete { .. } | JobStatus::Failed { .. })
    }

    /// Label of this status.
    pub fn label(&self) -> StatusLabel {
        match self {
            JobStatus::Queued => StatusLabel::Queued,
            JobStatus::Running { .. } => StatusLabel::Running,
            JobStatus::Complete { .. } => StatusLabel::Complete,
            JobStatus::Failed { .. } => StatusLabel::Failed,
        }
    }

    /// Whether moving to `next` respects `Queued -> Running -> terminal`.
    ///
    /// `Running -> Running` is allowed: an expired lease is re-claimed by
    /// another worker without going back to `Queued`.
    pub fn can_transition_to(&self, next: &JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running { .. })
                | (JobStatus::Running { .. }, JobStatus::Running { .. })
                | (JobStatus::Running { .. }, JobStatus::Complete { .. })
                | (JobStatus::Running { .. }, JobStatus::Failed { .. })
        )
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobStatus::Queued => None,
            JobStatus::Running { started_at, .. }
            | JobStatus::Complete { started_at, .. }
            | JobStatus::Failed { started_at, .. } => Some(*started_at),
        }
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobStatus::Complete { finished_at, .. } | JobStatus::Failed { finished_at, .. } => {
                Some(*finished_at)
            }
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        match self {
            JobStatus::Complete { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Status reported by a lookup.
///
/// Unlike `JobStatus` this includes `NotFound`, the answer for ids the broker
/// does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLabel {
    Queued,
    Running,
    Complete,
    Failed,
    NotFound,
}

impl StatusLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusLabel::Queued => "queued",
            StatusLabel::Running => "running",
            StatusLabel::Complete => "complete",
            StatusLabel::Failed => "failed",
            StatusLabel::NotFound => "not_found",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StatusLabel::Complete | StatusLabel::Failed)
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job is a named function call executed asynchronously by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Name of the registered handler that executes this job.
    pub function: String,
    /// Ordered handler arguments.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    /// Queue this job was submitted to.
    pub queue_name: String,
    /// Current status.
    pub status: JobStatus,
    /// Number of times a worker claimed this job.
    #[serde(default)]
    pub attempts: u32,
    /// When the job was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        queue_name: impl Into<String>,
        function: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            id: JobId::new(),
            function: function.into(),
            args,
            queue_name: queue_name.into(),
            status: JobStatus::Queued,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }

    /// Use a caller-chosen id.
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.status.started_at()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.status.finished_at()
    }
}
