//! Broker schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the broker schema.
///
/// Idempotent: every API and worker process runs it on connect.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::debug!("Initializing broker schema...");

    db.query(JOB_SCHEMA).await?.check()?;

    tracing::debug!("Broker schema initialized");

    Ok(())
}

/// Job table schema.
///
/// The record key is the job id. `status` is a tagged object whose shape
/// depends on the state, so the table stays schemaless and only the fields
/// used for claiming and retention are indexed.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMALESS;

DEFINE INDEX IF NOT EXISTS job_id ON job FIELDS job_id UNIQUE;
DEFINE INDEX IF NOT EXISTS job_status ON job FIELDS status.status;
DEFINE INDEX IF NOT EXISTS job_claim ON job FIELDS queue_name, status.status, score_ms;
DEFINE INDEX IF NOT EXISTS job_finished ON job FIELDS finished_ms;
"#;
