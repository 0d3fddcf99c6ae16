//! In-process job queue.
//!
//! Jobs live in an arena keyed by id; a separate FIFO holds the ids of
//! waiting jobs. At most one job is active at a time, and only [`JobQueue::drain`]
//! activates jobs. The state lock is never held across a collaborator call,
//! so `status`, `cancel` and `enqueue` stay responsive while a job polls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dubify_models::{DubRequest, FailureReason, Job, JobId, JobState, JobView, RetryMode, Transition};
use dubify_quota::Admission;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::events::JobEvent;
use crate::executor::{ExecutionOutcome, JobExecutor, JobSink};
use crate::metrics;

/// Summary of one `drain` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    pub completed: Vec<JobId>,
    pub failed: Vec<(JobId, FailureReason)>,
    /// Users whose remaining jobs were left waiting after a quota denial
    pub halted_users: Vec<String>,
    /// Drain stopped early because of a shutdown signal
    pub interrupted: bool,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    /// Enqueue order of every job still in the arena
    order: Vec<JobId>,
    waiting: VecDeque<JobId>,
    active: Option<JobId>,
}

impl QueueState {
    fn job(&self, id: &JobId) -> QueueResult<&Job> {
        self.jobs.get(id).ok_or_else(|| QueueError::not_found(id))
    }

    fn remove(&mut self, id: &JobId) -> Option<Job> {
        self.order.retain(|j| j != id);
        self.waiting.retain(|j| j != id);
        self.jobs.remove(id)
    }

    /// Pop the first waiting job whose owner is not halted.
    fn take_next(&mut self, halted: &HashSet<String>) -> Option<JobId> {
        let position = self.waiting.iter().position(|id| {
            self.jobs
                .get(id)
                .map(|job| !halted.contains(&job.user_id))
                .unwrap_or(false)
        })?;
        self.waiting.remove(position)
    }
}

/// Clears the drain flag when dropped.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Dub job queue with single-active-job sequencing.
pub struct JobQueue {
    state: Mutex<QueueState>,
    executor: JobExecutor,
    events: broadcast::Sender<JobEvent>,
    draining: AtomicBool,
}

impl JobQueue {
    pub fn new(executor: JobExecutor, config: &QueueConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            state: Mutex::new(QueueState::default()),
            executor,
            events,
            draining: AtomicBool::new(false),
        }
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Signal shutdown: the active job's poll is interrupted and `drain`
    /// stops before activating another job.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    fn emit(&self, job: &Job) {
        // No subscribers is fine
        let _ = self.events.send(JobEvent::from(job));
    }

    /// Validate and admit a request, then append the job to the waiting order.
    ///
    /// Validation and admission failures are returned here; the job never
    /// enters the queue.
    pub async fn enqueue(&self, request: DubRequest) -> QueueResult<JobId> {
        let job = match Job::from_request(&request) {
            Ok(job) => job,
            Err(e) => {
                metrics::record_job_rejected("validation");
                return Err(e.into());
            }
        };

        match self.executor.gate().admit(&job.user_id).await? {
            Admission::Allowed { .. } => {}
            Admission::Denied(reason) => {
                metrics::record_job_rejected("quota_exceeded");
                info!(user_id = %job.user_id, %reason, "Enqueue refused");
                return Err(QueueError::AdmissionDenied(reason));
            }
        }

        let id = job.id.clone();
        let mut state = self.state.lock().await;
        state.order.push(id.clone());
        state.waiting.push_back(id.clone());
        metrics::record_job_enqueued(job.target_language.as_str());
        metrics::record_waiting(state.waiting.len());
        info!(
            job_id = %id,
            user_id = %job.user_id,
            target_language = %job.target_language,
            auto_publish = job.auto_publish,
            "Job enqueued"
        );
        self.emit(&job);
        state.jobs.insert(id.clone(), job);
        Ok(id)
    }

    pub async fn status(&self, id: &JobId) -> QueueResult<JobView> {
        let state = self.state.lock().await;
        Ok(state.job(id)?.view())
    }

    /// All jobs in enqueue order.
    pub async fn list(&self) -> Vec<JobView> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.jobs.get(id))
            .map(Job::view)
            .collect()
    }

    /// Remove a waiting or failed job. The active job cannot be cancelled.
    pub async fn cancel(&self, id: &JobId) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        let job_state = state.job(id)?.state;

        if !matches!(job_state, JobState::Waiting | JobState::Failed) {
            return Err(QueueError::rejected(id, job_state, "cancel"));
        }

        state.remove(id);
        metrics::record_waiting(state.waiting.len());
        info!(job_id = %id, state = %job_state, "Job cancelled");
        Ok(())
    }

    /// Move a failed job back to the end of the waiting order.
    pub async fn retry(&self, id: &JobId) -> QueueResult<RetryMode> {
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(id).ok_or_else(|| QueueError::not_found(id))?;

        let job_state = job.state;
        let mode = job
            .retry()
            .map_err(|_| QueueError::rejected(id, job_state, "retry"))?;

        info!(job_id = %id, attempt = job.attempt, ?mode, "Job retried");
        let event = JobEvent::from(&*job);
        state.waiting.push_back(id.clone());
        metrics::record_job_retried(match mode {
            RetryMode::InPlace => "in_place",
            RetryMode::FromScratch => "from_scratch",
        });
        metrics::record_waiting(state.waiting.len());
        let _ = self.events.send(event);
        Ok(mode)
    }

    /// Remove a completed or failed job from the arena.
    pub async fn evict(&self, id: &JobId) -> QueueResult<JobView> {
        let mut state = self.state.lock().await;
        let job_state = state.job(id)?.state;

        if !job_state.is_terminal() {
            return Err(QueueError::rejected(id, job_state, "evict"));
        }

        state
            .remove(id)
            .map(|job| job.view())
            .ok_or_else(|| QueueError::not_found(id))
    }

    /// Run waiting jobs one at a time until none are runnable.
    ///
    /// A quota denial halts only the affected user's remaining jobs; any
    /// other failure is recorded and the drain continues. A second concurrent
    /// drain is rejected.
    pub async fn drain(&self) -> QueueResult<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(QueueError::internal("drain already in progress"));
        }
        let _guard = DrainGuard(&self.draining);

        let mut report = DrainReport::default();
        let mut halted: HashSet<String> = HashSet::new();

        loop {
            if self.executor.is_shutting_down() {
                report.interrupted = true;
                break;
            }

            let Some(job) = self.activate_next(&halted).await? else {
                break;
            };
            let id = job.id.clone();
            let user_id = job.user_id.clone();

            let outcome = match self.executor.run(job, self).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %id, error = %e, "Executor invariant violation");
                    self.force_fail(&id, e.to_string()).await;
                    ExecutionOutcome::Failed(FailureReason::Internal)
                }
            };

            self.deactivate(&id).await;

            match outcome {
                ExecutionOutcome::Completed => report.completed.push(id),
                ExecutionOutcome::Failed(reason) => {
                    if reason == FailureReason::QuotaExceeded && halted.insert(user_id.clone()) {
                        warn!(user_id = %user_id, "Quota exhausted, halting user's remaining jobs");
                        report.halted_users.push(user_id);
                    }
                    if reason == FailureReason::Interrupted {
                        report.interrupted = true;
                    }
                    report.failed.push((id, reason));
                }
            }
        }

        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            halted_users = report.halted_users.len(),
            interrupted = report.interrupted,
            "Drain finished"
        );
        Ok(report)
    }

    async fn activate_next(&self, halted: &HashSet<String>) -> QueueResult<Option<Job>> {
        let mut state = self.state.lock().await;

        if let Some(active) = &state.active {
            return Err(QueueError::internal(format!(
                "job {} is still active",
                active
            )));
        }

        let Some(id) = state.take_next(halted) else {
            return Ok(None);
        };
        metrics::record_waiting(state.waiting.len());

        let job = state.job(&id)?.clone();
        if job.state != JobState::Waiting {
            return Err(QueueError::internal(format!(
                "job {} in waiting order has state {}",
                id, job.state
            )));
        }

        state.active = Some(id);
        Ok(Some(job))
    }

    async fn deactivate(&self, id: &JobId) {
        let mut state = self.state.lock().await;
        if state.active.as_ref() == Some(id) {
            state.active = None;
        }
    }

    /// Mark the active job `Failed(Internal)` after the executor bailed out.
    async fn force_fail(&self, id: &JobId, message: String) {
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(id) else {
            return;
        };

        if job.state.is_terminal() {
            return;
        }

        match job.apply(Transition::fail(FailureReason::Internal, message)) {
            Ok(()) => {
                metrics::record_job_failed(FailureReason::Internal.as_str());
                let event = JobEvent::from(&*job);
                let _ = self.events.send(event);
            }
            Err(e) => error!(job_id = %id, error = %e, "Failed to mark job as failed"),
        }
    }
}

#[async_trait]
impl JobSink for JobQueue {
    async fn record(&self, id: &JobId, transition: Transition) -> QueueResult<Job> {
        let mut state = self.state.lock().await;

        if state.active.as_ref() != Some(id) {
            return Err(QueueError::internal(format!(
                "transition {} for inactive job {}",
                transition.name(),
                id
            )));
        }

        let job = state.jobs.get_mut(id).ok_or_else(|| QueueError::not_found(id))?;
        job.apply(transition)?;

        let job = job.clone();
        self.emit(&job);
        Ok(job)
    }
}
