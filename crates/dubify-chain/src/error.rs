//! Chain publish error types.

use thiserror::Error;

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Chain publish not configured: {0}")]
    NotConfigured(String),

    #[error("OAuth token refresh failed: {0}")]
    AuthFailed(String),

    #[error("Failed to download result: {0}")]
    DownloadFailed(String),

    #[error("Upload rejected: {0}")]
    UploadRejected(String),

    #[error("Platform server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid platform response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ChainError {
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            401 | 403 => Self::AuthFailed(msg),
            429 => Self::RateLimited(msg),
            500..=599 => Self::ServerError(status, msg),
            _ => Self::UploadRejected(msg),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::Network(_) | ChainError::RateLimited(_) | ChainError::ServerError(..)
        )
    }
}
