//! Job repository: the job record store shared by submitters and workers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use task_core::{Job, JobId, JobStatus};

use crate::{Database, DbError};

/// How many claim candidates are read per attempt.
const CLAIM_CANDIDATES: i64 = 10;

/// Repository for job persistence operations.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

/// Stored job record.
///
/// Mirrors `Job` plus the bookkeeping fields the broker needs for claiming,
/// leases and retention. The record key is the job id; `job_id` repeats it
/// as a plain string so rows can be read without decoding record ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobRecord {
    job_id: String,
    function: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    queue_name: String,
    status: JobStatus,
    #[serde(default)]
    attempts: u32,
    enqueued_at: DateTime<Utc>,
    /// Earliest time (epoch ms) a worker may claim the job.
    score_ms: i64,
    /// Lease end (epoch ms) while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lease_expires_ms: Option<i64>,
    /// Time (epoch ms) the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finished_ms: Option<i64>,
}

impl JobRecord {
    fn from_job(job: &Job, score_ms: i64) -> Self {
        Self {
            job_id: job.id.to_string(),
            function: job.function.clone(),
            args: job.args.clone(),
            queue_name: job.queue_name.clone(),
            status: job.status.clone(),
            attempts: job.attempts,
            enqueued_at: job.enqueued_at,
            score_ms,
            lease_expires_ms: None,
            finished_ms: None,
        }
    }

    fn into_job(self) -> Result<Job, DbError> {
        let id = JobId::parse(&self.job_id)
            .map_err(|e| DbError::Query(format!("Stored job id {:?}: {}", self.job_id, e)))?;
        Ok(Job {
            id,
            function: self.function,
            args: self.args,
            queue_name: self.queue_name,
            status: self.status,
            attempts: self.attempts,
            enqueued_at: self.enqueued_at,
        })
    }
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new queued job, claimable from `score_ms` on.
    pub async fn create(&self, job: &Job, score_ms: i64) -> Result<Job, DbError> {
        if !matches!(job.status, JobStatus::Queued) {
            return Err(DbError::InvalidTransition(format!(
                "new job {} must be queued, got {}",
                job.id,
                job.status.label()
            )));
        }

        let key = job.id.to_string();

        // Caller-chosen ids must not replace a stored job.
        let existing: Option<JobRecord> = self.db.select(("job", key.as_str())).await?;
        if existing.is_some() {
            return Err(DbError::Duplicate(key));
        }

        let record: Option<JobRecord> = self
            .db
            .create(("job", key.as_str()))
            .content(JobRecord::from_job(job, score_ms))
            .await?;

        record
            .ok_or_else(|| DbError::Query("Failed to create job".into()))?
            .into_job()
    }

    /// Get a job by ID. Unknown ids yield `None`.
    pub async fn get(&self, id: &JobId) -> Result<Option<Job>, DbError> {
        let record: Option<JobRecord> = self.db.select(("job", id.as_str())).await?;
        record.map(JobRecord::into_job).transpose()
    }

    /// Claim the next claimable job of a queue for `worker_id`.
    ///
    /// A job is claimable when it is queued and due, or when it is running
    /// but its lease expired. Claiming is a compare-and-set on the record,
    /// so concurrent workers never both win the same job.
    pub async fn claim(
        &self,
        queue_name: &str,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<Job>, DbError> {
        let now_ms = Utc::now().timestamp_millis();

        let mut response = self
            .db
            .query(
                r#"
                SELECT job_id, score_ms FROM job
                WHERE queue_name = $queue_name
                    AND score_ms <= $now
                    AND (status.status = "queued"
                        OR (status.status = "running" AND lease_expires_ms < $now))
                ORDER BY score_ms ASC
                LIMIT $limit
                "#,
            )
            .bind(("queue_name", queue_name.to_string()))
            .bind(("now", now_ms))
            .bind(("limit", CLAIM_CANDIDATES))
            .await?;

        #[derive(Deserialize)]
        struct Candidate {
            job_id: String,
        }

        let candidates: Vec<Candidate> = response.take(0)?;

        for candidate in candidates {
            let now = Utc::now();
            let status = JobStatus::Running {
                started_at: now,
                worker_id: worker_id.to_string(),
            };
            let lease_ms = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);

            let mut response = self
                .db
                .query(
                    r#"
                    UPDATE type::thing("job", $job_id)
                    SET status = $status,
                        attempts += 1,
                        lease_expires_ms = $lease_until
                    WHERE status.status = "queued"
                        OR (status.status = "running" AND lease_expires_ms < $now)
                    RETURN AFTER
                    "#,
                )
                .bind(("job_id", candidate.job_id))
                .bind(("status", status))
                .bind(("lease_until", now.timestamp_millis().saturating_add(lease_ms)))
                .bind(("now", now.timestamp_millis()))
                .await?;

            let claimed: Vec<JobRecord> = response.take(0)?;
            if let Some(record) = claimed.into_iter().next() {
                return record.into_job().map(Some);
            }
            // Another worker won this one, try the next candidate.
        }

        Ok(None)
    }

    /// Record a successful outcome for a job claimed by this worker.
    ///
    /// Returns `None` when the job is no longer owned by the worker (lease
    /// lost, or already terminal); the stored record is left untouched.
    pub async fn complete(
        &self,
        job: &Job,
        result: serde_json::Value,
    ) -> Result<Option<Job>, DbError> {
        let status = JobStatus::Complete {
            started_at: job.started_at().unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
            result,
        };
        self.finish(job, status).await
    }

    /// Record a failure for a job claimed by this worker.
    pub async fn fail(&self, job: &Job, error: impl Into<String>) -> Result<Option<Job>, DbError> {
        let status = JobStatus::Failed {
            started_at: job.started_at().unwrap_or_else(Utc::now),
            finished_at: Utc::now(),
            error: error.into(),
        };
        self.finish(job, status).await
    }

    async fn finish(&self, job: &Job, status: JobStatus) -> Result<Option<Job>, DbError> {
        let worker_id = match &job.status {
            JobStatus::Running { worker_id, .. } if job.status.can_transition_to(&status) => {
                worker_id.clone()
            }
            current => {
                return Err(DbError::InvalidTransition(format!(
                    "job {} is {}, cannot become {}",
                    job.id,
                    current.label(),
                    status.label()
                )));
            }
        };

        let finished_ms = status
            .finished_at()
            .map(|t| t.timestamp_millis())
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        let mut response = self
            .db
            .query(
                r#"
                UPDATE type::thing("job", $job_id)
                SET status = $status,
                    lease_expires_ms = NONE,
                    finished_ms = $finished_ms
                WHERE status.status = "running" AND status.worker_id = $worker_id
                RETURN AFTER
                "#,
            )
            .bind(("job_id", job.id.to_string()))
            .bind(("status", status))
            .bind(("finished_ms", finished_ms))
            .bind(("worker_id", worker_id))
            .await?;

        let records: Vec<JobRecord> = response.take(0)?;
        records.into_iter().next().map(JobRecord::into_job).transpose()
    }

    /// Delete terminal jobs that finished before `cutoff`.
    ///
    /// Returns the number of removed records.
    pub async fn purge_finished(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let mut response = self
            .db
            .query(
                r#"
                DELETE job
                WHERE finished_ms != NONE AND finished_ms < $cutoff
                RETURN BEFORE
                "#,
            )
            .bind(("cutoff", cutoff.timestamp_millis()))
            .await?;

        let removed: Vec<JobRecord> = response.take(0)?;
        Ok(removed.len())
    }
}
