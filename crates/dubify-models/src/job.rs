//! Dub job definitions and lifecycle.
//!
//! A [`Job`] only changes state through [`Job::apply`] (executor-driven
//! transitions) and [`Job::retry`] (user-driven). Both validate the move
//! against the lifecycle below and refuse to reassign `provider_job_id` or
//! `result_url` once set.
//!
//! ```text
//! Waiting    -> Submitting -> Polling -> Publishing -> Completed
//!    |             |            |            |
//!    +-------------+------------+------------+-----> Failed -> (retry) Waiting
//! ```

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::language::TargetLanguage;
use crate::request::DubRequest;

/// Unique identifier for a dub job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job is waiting in the queue
    #[default]
    Waiting,
    /// Submission to the dub provider is in flight
    Submitting,
    /// Provider accepted the job; status is being polled
    Polling,
    /// Result is being stored, signed and optionally chain-published
    Publishing,
    /// Job finished successfully
    Completed,
    /// Job failed; see `last_error`
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Submitting => "submitting",
            JobState::Polling => "polling",
            JobState::Publishing => "publishing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// States held by the single job currently being executed.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Submitting | JobState::Polling | JobState::Publishing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a job ended in [`JobState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// User's plan limit was reached
    QuotaExceeded,
    /// Submit, poll or fetch against the dub provider failed
    ProviderError,
    /// Storage, signing or chain publish failed
    PublishError,
    /// Provider job did not finish within the polling budget
    Timeout,
    /// Executor was shut down while the job was polling
    Interrupted,
    /// Invariant violation detected while running the job
    Internal,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::QuotaExceeded => "quota_exceeded",
            FailureReason::ProviderError => "provider_error",
            FailureReason::PublishError => "publish_error",
            FailureReason::Timeout => "timeout",
            FailureReason::Interrupted => "interrupted",
            FailureReason::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure recorded on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Executor-reported state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Waiting -> Submitting (admission passed)
    Submit,
    /// Submitting -> Polling with the provider's handle
    Accepted { provider_job_id: String },
    /// Polling -> Publishing
    Ready,
    /// Waiting -> Publishing for a chain-only retry
    ResumePublish,
    /// Result stored and signed (stays Publishing)
    Published { result_url: String },
    /// Chain publish succeeded (stays Publishing)
    Chained { external_video_id: String },
    /// Publishing -> Completed
    Complete,
    /// Any non-terminal state -> Failed
    Fail(JobFailure),
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Accepted { .. } => "accepted",
            Transition::Ready => "ready",
            Transition::ResumePublish => "resume_publish",
            Transition::Published { .. } => "published",
            Transition::Chained { .. } => "chained",
            Transition::Complete => "complete",
            Transition::Fail(_) => "fail",
        }
    }

    pub fn fail(reason: FailureReason, message: impl Into<String>) -> Self {
        Transition::Fail(JobFailure {
            reason,
            message: message.into(),
        })
    }
}

/// How a failed job re-enters the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Only the chain publish failed; the dubbed result is kept and only the
    /// chain step runs again.
    InPlace,
    /// Provider handle and result are cleared; the job starts over.
    FromScratch,
}

/// A dub job owned by the queue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// Owner; the quota subject
    pub user_id: String,
    /// Input video locator (URL or uploaded blob reference)
    pub source_ref: String,
    /// Requested output language
    pub target_language: TargetLanguage,
    /// Chain-publish the result on success
    pub auto_publish: bool,
    /// Title used for the chain publish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Lifecycle state
    pub state: JobState,
    /// Provider handle, set once the provider accepts the submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_job_id: Option<String>,
    /// Signed result URL, set once publishing stored the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Video id returned by the chain publish
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_video_id: Option<String>,
    /// Only populated in `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<JobFailure>,
    /// 1 on enqueue, bumped on every retry
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a waiting job from a validated request.
    pub fn new(
        user_id: impl Into<String>,
        source_ref: impl Into<String>,
        target_language: TargetLanguage,
        auto_publish: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            source_ref: source_ref.into(),
            target_language,
            auto_publish,
            title: None,
            state: JobState::Waiting,
            provider_job_id: None,
            result_url: None,
            external_video_id: None,
            last_error: None,
            attempt: 1,
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    /// Build a job from a caller request, validating it first.
    pub fn from_request(request: &DubRequest) -> ModelResult<Self> {
        let language = request.validated_language()?;
        let mut job = Self::new(
            request.user_id.trim(),
            request.source_ref.trim(),
            language,
            request.auto_publish,
        );
        job.title = request
            .title
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(job)
    }

    /// Set the chain-publish title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title for the chain publish, falling back to a language-based default.
    pub fn publish_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Dubbed video ({})", self.target_language.display_name()))
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.last_error.as_ref().map(|e| e.reason)
    }

    /// True when this job should skip straight to the chain step.
    pub fn resumes_at_chain(&self) -> bool {
        self.state == JobState::Waiting && self.result_url.is_some() && self.auto_publish
    }

    /// Apply an executor transition, validating it against the lifecycle.
    pub fn apply(&mut self, transition: Transition) -> ModelResult<()> {
        let name = transition.name();
        match (self.state, transition) {
            (JobState::Waiting, Transition::Submit) => {
                self.state = JobState::Submitting;
                self.started_at = Some(Utc::now());
            }
            (JobState::Waiting, Transition::ResumePublish) => {
                if self.result_url.is_none() {
                    return Err(ModelError::illegal(self.state, name));
                }
                self.state = JobState::Publishing;
                self.started_at = Some(Utc::now());
            }
            (JobState::Submitting, Transition::Accepted { provider_job_id }) => {
                if self.provider_job_id.is_some() {
                    return Err(ModelError::AlreadySet("provider_job_id"));
                }
                self.provider_job_id = Some(provider_job_id);
                self.state = JobState::Polling;
            }
            (JobState::Polling, Transition::Ready) => {
                self.state = JobState::Publishing;
            }
            (JobState::Publishing, Transition::Published { result_url }) => {
                if self.result_url.is_some() {
                    return Err(ModelError::AlreadySet("result_url"));
                }
                self.result_url = Some(result_url);
            }
            (JobState::Publishing, Transition::Chained { external_video_id }) => {
                if self.external_video_id.is_some() {
                    return Err(ModelError::AlreadySet("external_video_id"));
                }
                self.external_video_id = Some(external_video_id);
            }
            (JobState::Publishing, Transition::Complete) => {
                if self.result_url.is_none() {
                    return Err(ModelError::illegal(self.state, name));
                }
                self.state = JobState::Completed;
                self.finished_at = Some(Utc::now());
            }
            (state, Transition::Fail(failure)) if !state.is_terminal() => {
                self.state = JobState::Failed;
                self.last_error = Some(failure);
                self.finished_at = Some(Utc::now());
            }
            (state, _) => return Err(ModelError::illegal(state, name)),
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move a failed job back to `Waiting`.
    ///
    /// Chain-only failures keep the dubbed result and resume in place;
    /// everything else starts over with the provider handle cleared.
    pub fn retry(&mut self) -> ModelResult<RetryMode> {
        if self.state != JobState::Failed {
            return Err(ModelError::illegal(self.state, "retry"));
        }

        let chain_only = self.failure_reason() == Some(FailureReason::PublishError)
            && self.result_url.is_some();

        let mode = if chain_only {
            RetryMode::InPlace
        } else {
            self.provider_job_id = None;
            self.result_url = None;
            self.external_video_id = None;
            RetryMode::FromScratch
        };

        self.state = JobState::Waiting;
        self.last_error = None;
        self.attempt += 1;
        self.started_at = None;
        self.finished_at = None;
        self.updated_at = Utc::now();
        Ok(mode)
    }

    /// Caller-facing snapshot.
    pub fn view(&self) -> JobView {
        JobView::from(self)
    }
}

/// Caller-facing snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobView {
    pub id: JobId,
    pub user_id: String,
    pub source_ref: String,
    pub target_language: String,
    pub auto_publish: bool,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<JobFailure>,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            user_id: job.user_id.clone(),
            source_ref: job.source_ref.clone(),
            target_language: job.target_language.to_string(),
            auto_publish: job.auto_publish,
            state: job.state,
            provider_job_id: job.provider_job_id.clone(),
            result_url: job.result_url.clone(),
            external_video_id: job.external_video_id.clone(),
            last_error: job.last_error.clone(),
            attempt: job.attempt,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(auto_publish: bool) -> Job {
        Job::new(
            "user123",
            "https://www.youtube.com/watch?v=abc",
            TargetLanguage::parse("es").unwrap(),
            auto_publish,
        )
    }

    fn run_to_publishing(job: &mut Job) {
        job.apply(Transition::Submit).unwrap();
        job.apply(Transition::Accepted {
            provider_job_id: "dub_1".into(),
        })
        .unwrap();
        job.apply(Transition::Ready).unwrap();
    }

    #[test]
    fn test_happy_path() {
        let mut job = job(false);
        assert_eq!(job.state, JobState::Waiting);

        run_to_publishing(&mut job);
        assert_eq!(job.state, JobState::Publishing);
        assert!(job.is_active());

        job.apply(Transition::Published {
            result_url: "https://signed".into(),
        })
        .unwrap();
        job.apply(Transition::Complete).unwrap();

        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.provider_job_id.as_deref(), Some("dub_1"));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_complete_requires_result_url() {
        let mut job = job(false);
        run_to_publishing(&mut job);
        assert!(job.apply(Transition::Complete).is_err());
        assert_eq!(job.state, JobState::Publishing);
    }

    #[test]
    fn test_provider_job_id_is_immutable() {
        let mut job = job(false);
        job.apply(Transition::Submit).unwrap();
        job.apply(Transition::Accepted {
            provider_job_id: "dub_1".into(),
        })
        .unwrap();

        // Wrong state for a second acceptance
        let err = job
            .apply(Transition::Accepted {
                provider_job_id: "dub_2".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ModelError::IllegalTransition { .. }));
        assert_eq!(job.provider_job_id.as_deref(), Some("dub_1"));
    }

    #[test]
    fn test_result_url_is_immutable() {
        let mut job = job(false);
        run_to_publishing(&mut job);
        job.apply(Transition::Published {
            result_url: "https://first".into(),
        })
        .unwrap();

        let err = job
            .apply(Transition::Published {
                result_url: "https://second".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ModelError::AlreadySet("result_url")));
        assert_eq!(job.result_url.as_deref(), Some("https://first"));
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut job = job(false);
        job.apply(Transition::fail(FailureReason::QuotaExceeded, "limit reached"))
            .unwrap();
        assert_eq!(job.state, JobState::Failed);

        assert!(job.apply(Transition::Submit).is_err());
        assert!(job
            .apply(Transition::fail(FailureReason::ProviderError, "again"))
            .is_err());
        assert_eq!(job.failure_reason(), Some(FailureReason::QuotaExceeded));
    }

    #[test]
    fn test_retry_from_scratch_clears_provider_handle() {
        let mut job = job(false);
        job.apply(Transition::Submit).unwrap();
        job.apply(Transition::Accepted {
            provider_job_id: "dub_1".into(),
        })
        .unwrap();
        job.apply(Transition::fail(FailureReason::ProviderError, "dubbing failed"))
            .unwrap();

        let mode = job.retry().unwrap();
        assert_eq!(mode, RetryMode::FromScratch);
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempt, 2);
        assert!(job.provider_job_id.is_none());
        assert!(job.last_error.is_none());
    }

    #[test]
    fn test_retry_in_place_keeps_result() {
        let mut job = job(true);
        run_to_publishing(&mut job);
        job.apply(Transition::Published {
            result_url: "https://signed".into(),
        })
        .unwrap();
        job.apply(Transition::fail(FailureReason::PublishError, "upload failed"))
            .unwrap();
        assert!(job.result_url.is_some());

        let mode = job.retry().unwrap();
        assert_eq!(mode, RetryMode::InPlace);
        assert_eq!(job.provider_job_id.as_deref(), Some("dub_1"));
        assert_eq!(job.result_url.as_deref(), Some("https://signed"));
        assert!(job.resumes_at_chain());

        job.apply(Transition::ResumePublish).unwrap();
        assert_eq!(job.state, JobState::Publishing);
    }

    #[test]
    fn test_retry_rejected_unless_failed() {
        let mut job = job(false);
        let before = job.clone();
        assert!(job.retry().is_err());
        assert_eq!(job.state, before.state);
        assert_eq!(job.attempt, before.attempt);
        assert_eq!(job.updated_at, before.updated_at);
    }

    #[test]
    fn test_resume_requires_result() {
        let mut job = job(true);
        assert!(job.apply(Transition::ResumePublish).is_err());
    }

    #[test]
    fn test_publish_title_default() {
        let job = job(true);
        assert_eq!(job.publish_title(), "Dubbed video (Spanish)");
        assert_eq!(job.with_title("Mi video").publish_title(), "Mi video");
    }

    #[test]
    fn test_view_serializes_snake_case_state() {
        let job = job(false);
        let json = serde_json::to_value(job.view()).unwrap();
        assert_eq!(json["state"], "waiting");
        assert_eq!(json["target_language"], "es");
        assert!(json.get("result_url").is_none());
    }
}
