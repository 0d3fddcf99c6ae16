//! Provider contract.

use async_trait::async_trait;
use dubify_models::TargetLanguage;

use crate::error::ProviderResult;

/// Status of a provider-side dubbing job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Pending,
    Ready,
    /// Provider reported a terminal failure; not retried.
    Failed(String),
}

/// Dubbed media returned by the provider.
#[derive(Debug, Clone)]
pub struct DubbedMedia {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl DubbedMedia {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// External dubbing service.
///
/// Calls are idempotent at the call level and never retried internally;
/// the executor owns the polling cadence.
#[async_trait]
pub trait DubProvider: Send + Sync {
    /// Submit a source video for dubbing; returns the provider job handle.
    async fn submit(
        &self,
        source_ref: &str,
        target_language: &TargetLanguage,
    ) -> ProviderResult<String>;

    async fn poll_status(&self, provider_job_id: &str) -> ProviderResult<ProviderStatus>;

    /// Download the dubbed media. Only valid once the job is `Ready`.
    async fn fetch_result(
        &self,
        provider_job_id: &str,
        target_language: &TargetLanguage,
    ) -> ProviderResult<DubbedMedia>;
}
