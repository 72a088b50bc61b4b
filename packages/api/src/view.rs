use serde::Serialize;
use task_core::{Job, StatusLabel};

/// Status poll answer for one job id.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: String,
    pub status: StatusLabel,
    /// Full record, `null` when the id is unknown.
    pub info: Option<Job>,
}

impl JobView {
    pub fn new(id: impl Into<String>, info: Option<Job>) -> Self {
        Self {
            id: id.into(),
            status: info
                .as_ref()
                .map_or(StatusLabel::NotFound, |job| job.status.label()),
            info,
        }
    }
}
