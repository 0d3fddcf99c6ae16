//! Quota error types.

use thiserror::Error;

/// Result type for quota operations.
pub type QuotaResult<T> = Result<T, QuotaError>;

/// Errors raised by a quota store. A denial is not an error.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("Quota record not found: {0}")]
    NotFound(String),

    #[error("Quota store unavailable: {0}")]
    Unavailable(String),

    #[error("Quota update conflicted: {0}")]
    Conflict(String),
}

impl QuotaError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, QuotaError::Unavailable(_) | QuotaError::Conflict(_))
    }
}
