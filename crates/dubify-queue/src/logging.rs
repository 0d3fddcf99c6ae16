//! Per-job lifecycle logging.
//!
//! Every line carries the job's identity, and once the provider has accepted
//! the submission, its `provider_job_id`. All lines of one run are emitted
//! inside a `dub_job` span.

use std::time::Duration;

use dubify_models::{FailureReason, Job};
use tracing::{error, field, info, warn, Span};

/// Lifecycle logger for one executor run of a job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    user_id: String,
    language: String,
    attempt: u32,
    provider_job_id: Option<String>,
    span: Span,
}

impl JobLogger {
    pub fn for_job(job: &Job) -> Self {
        let span = tracing::info_span!(
            "dub_job",
            job_id = %job.id,
            user_id = %job.user_id,
            language = %job.target_language,
            attempt = job.attempt,
            provider_job_id = field::Empty,
        );
        let logger = Self {
            job_id: job.id.to_string(),
            user_id: job.user_id.clone(),
            language: job.target_language.to_string(),
            attempt: job.attempt,
            provider_job_id: None,
            span,
        };
        match job.provider_job_id.as_deref() {
            Some(provider_job_id) => logger.with_provider_job(provider_job_id),
            None => logger,
        }
    }

    /// Attach the provider handle to this logger and its span.
    pub fn with_provider_job(mut self, provider_job_id: &str) -> Self {
        self.span.record("provider_job_id", provider_job_id);
        self.provider_job_id = Some(provider_job_id.to_string());
        self
    }

    pub fn span(&self) -> Span {
        self.span.clone()
    }

    fn provider_job(&self) -> &str {
        self.provider_job_id.as_deref().unwrap_or("-")
    }

    pub fn started(&self, source_ref: &str) {
        info!(
            job_id = %self.job_id,
            user_id = %self.user_id,
            attempt = self.attempt,
            "Dubbing {} into {}", source_ref, self.language
        );
    }

    pub fn resumed_chain(&self) {
        info!(
            job_id = %self.job_id,
            provider_job_id = %self.provider_job(),
            attempt = self.attempt,
            "Dub already stored, retrying chain publish only"
        );
    }

    pub fn admitted(&self, remaining: u32) {
        info!(
            job_id = %self.job_id,
            user_id = %self.user_id,
            remaining,
            "Quota admitted"
        );
    }

    pub fn accepted(&self) {
        info!(
            job_id = %self.job_id,
            provider_job_id = %self.provider_job(),
            "Provider accepted submission"
        );
    }

    pub fn status_check_failed(&self, check: u32, error: &dyn std::fmt::Display) {
        warn!(
            job_id = %self.job_id,
            provider_job_id = %self.provider_job(),
            check,
            "Status check failed, will retry: {}", error
        );
    }

    pub fn dub_ready(&self, checks: u32) {
        info!(
            job_id = %self.job_id,
            provider_job_id = %self.provider_job(),
            checks,
            "Provider finished dubbing"
        );
    }

    /// `stage` is `storage` or `chain`.
    pub fn published(&self, stage: &str, target: &str) {
        info!(
            job_id = %self.job_id,
            provider_job_id = %self.provider_job(),
            stage,
            "Published to {}", target
        );
    }

    pub fn completed(&self, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            user_id = %self.user_id,
            attempt = self.attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "Job completed"
        );
    }

    pub fn failed(&self, reason: FailureReason, message: &str) {
        error!(
            job_id = %self.job_id,
            provider_job_id = %self.provider_job(),
            attempt = self.attempt,
            reason = reason.as_str(),
            "Job failed: {}", message
        );
    }
}
