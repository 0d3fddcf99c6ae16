//! Job lifecycle events.

use chrono::{DateTime, Utc};
use dubify_models::{Job, JobFailure, JobId, JobState};
use serde::Serialize;

/// Broadcast on every job state change.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub user_id: String,
    pub state: JobState,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub at: DateTime<Utc>,
}

impl From<&Job> for JobEvent {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            user_id: job.user_id.clone(),
            state: job.state,
            attempt: job.attempt,
            result_url: job.result_url.clone(),
            error: job.last_error.clone(),
            at: job.updated_at,
        }
    }
}
