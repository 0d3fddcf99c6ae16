//! Queue error types.

use dubify_models::{JobState, ModelError};
use dubify_quota::QuotaError;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Missing or invalid source or language; the job never entered the queue.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Quota exceeded at enqueue; the job never entered the queue.
    #[error("Admission denied: {0}")]
    AdmissionDenied(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The operation is not allowed in the job's current state.
    #[error("Cannot {action} job {job_id} in state {state}")]
    Rejected {
        job_id: String,
        state: JobState,
        action: &'static str,
    },

    #[error("Quota store error: {0}")]
    Quota(#[from] QuotaError),

    /// Invariant violation (second active job, illegal transition, concurrent drain).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn not_found(job_id: impl ToString) -> Self {
        Self::JobNotFound(job_id.to_string())
    }

    pub fn rejected(job_id: impl ToString, state: JobState, action: &'static str) -> Self {
        Self::Rejected {
            job_id: job_id.to_string(),
            state,
            action,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, QueueError::Rejected { .. })
    }
}

impl From<ModelError> for QueueError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation(_) | ModelError::UnsupportedLanguage(_) => {
                QueueError::Validation(err.to_string())
            }
            ModelError::IllegalTransition { .. } | ModelError::AlreadySet(_) => {
                QueueError::Internal(err.to_string())
            }
        }
    }
}
