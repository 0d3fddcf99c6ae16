//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "dubify_jobs_enqueued_total";
    pub const JOBS_REJECTED_TOTAL: &str = "dubify_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "dubify_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "dubify_jobs_failed_total";
    pub const JOBS_RETRIED_TOTAL: &str = "dubify_jobs_retried_total";
    pub const QUEUE_WAITING: &str = "dubify_queue_waiting";

    pub const POLL_ATTEMPTS_TOTAL: &str = "dubify_poll_attempts_total";
    pub const SUBMISSION_DURATION_SECONDS: &str = "dubify_submission_duration_seconds";
    pub const PUBLISH_DURATION_SECONDS: &str = "dubify_publish_duration_seconds";
    pub const JOB_DURATION_SECONDS: &str = "dubify_job_duration_seconds";
}

pub fn record_job_enqueued(language: &str) {
    let labels = [("language", language.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

/// Enqueue refused before the job entered the queue.
pub fn record_job_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_REJECTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_retried(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::JOBS_RETRIED_TOTAL, &labels).increment(1);
}

pub fn record_waiting(length: usize) {
    gauge!(names::QUEUE_WAITING).set(length as f64);
}

pub fn record_poll_attempt(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::POLL_ATTEMPTS_TOTAL, &labels).increment(1);
}

pub fn record_submission_duration(duration_secs: f64) {
    histogram!(names::SUBMISSION_DURATION_SECONDS).record(duration_secs);
}

pub fn record_publish_duration(step: &str, duration_secs: f64) {
    let labels = [("step", step.to_string())];
    histogram!(names::PUBLISH_DURATION_SECONDS, &labels).record(duration_secs);
}
