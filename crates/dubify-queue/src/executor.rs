//! Job executor.
//!
//! Drives a single job through its lifecycle:
//!
//! ```text
//! Waiting -> admit -> Submitting -> submit -> Polling -> poll -> Publishing
//!         -> fetch -> store + sign -> [chain publish] -> Completed
//! ```
//!
//! Every state change goes through a [`JobSink`], which validates it against
//! the job lifecycle. Collaborator failures end the job in `Failed` with a
//! reason; only sink errors (invariant violations) are returned as `Err`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dubify_chain::UploadChainer;
use dubify_models::{FailureReason, Job, JobId, Transition};
use dubify_provider::DubProvider;
use dubify_quota::{Admission, QuotaGate};
use dubify_storage::ResultPublisher;
use tokio::sync::watch;
use tracing::Instrument;

use crate::error::QueueResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::poll::{poll_until_terminal, PollOutcome, PollPolicy};

/// Receives validated state transitions for the active job.
#[async_trait]
pub trait JobSink: Send + Sync {
    /// Apply `transition` to job `id` and return the updated job.
    async fn record(&self, id: &JobId, transition: Transition) -> QueueResult<Job>;
}

/// Terminal result of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Failed(FailureReason),
}

/// Job executor. Runs one job at a time on behalf of the queue.
pub struct JobExecutor {
    provider: Arc<dyn DubProvider>,
    gate: QuotaGate,
    publisher: ResultPublisher,
    chainer: Option<Arc<dyn UploadChainer>>,
    poll_policy: PollPolicy,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(
        provider: Arc<dyn DubProvider>,
        gate: QuotaGate,
        publisher: ResultPublisher,
        chainer: Option<Arc<dyn UploadChainer>>,
        poll_policy: PollPolicy,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            provider,
            gate,
            publisher,
            chainer,
            poll_policy,
            shutdown,
        }
    }

    pub fn gate(&self) -> &QuotaGate {
        &self.gate
    }

    /// Signal shutdown. An in-flight poll wait is interrupted immediately.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run `job` to a terminal state.
    pub async fn run(&self, job: Job, sink: &dyn JobSink) -> QueueResult<ExecutionOutcome> {
        let logger = JobLogger::for_job(&job);
        let span = logger.span();
        let started = Instant::now();

        let outcome = async {
            if job.resumes_at_chain() {
                logger.resumed_chain();
                self.resume_chain(&job, sink, &logger).await
            } else {
                logger.started(&job.source_ref);
                self.run_full(&job, sink, &logger).await
            }
        }
        .instrument(span)
        .await?;

        match outcome {
            ExecutionOutcome::Completed => {
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                logger.completed(started.elapsed());
            }
            ExecutionOutcome::Failed(reason) => {
                metrics::record_job_failed(reason.as_str());
            }
        }
        Ok(outcome)
    }

    async fn run_full(
        &self,
        job: &Job,
        sink: &dyn JobSink,
        logger: &JobLogger,
    ) -> QueueResult<ExecutionOutcome> {
        let id = &job.id;

        match self.gate.admit(&job.user_id).await {
            Ok(Admission::Allowed { remaining }) => {
                logger.admitted(remaining);
            }
            Ok(Admission::Denied(reason)) => {
                return self
                    .fail(sink, id, logger, FailureReason::QuotaExceeded, reason)
                    .await;
            }
            Err(e) => {
                return self
                    .fail(
                        sink,
                        id,
                        logger,
                        FailureReason::Internal,
                        format!("quota check failed: {}", e),
                    )
                    .await;
            }
        }

        sink.record(id, Transition::Submit).await?;

        let submit_started = Instant::now();
        let provider_job_id = match self
            .provider
            .submit(&job.source_ref, &job.target_language)
            .await
        {
            Ok(provider_job_id) => provider_job_id,
            Err(e) => {
                return self
                    .fail(sink, id, logger, FailureReason::ProviderError, e.to_string())
                    .await;
            }
        };
        metrics::record_submission_duration(submit_started.elapsed().as_secs_f64());

        sink.record(
            id,
            Transition::Accepted {
                provider_job_id: provider_job_id.clone(),
            },
        )
        .await?;
        let logger = &logger.clone().with_provider_job(&provider_job_id);
        logger.accepted();

        match self.gate.record_submission(&job.user_id).await {
            Ok(Admission::Allowed { .. }) => {}
            Ok(Admission::Denied(reason)) => {
                return self
                    .fail(sink, id, logger, FailureReason::QuotaExceeded, reason)
                    .await;
            }
            Err(e) => {
                return self
                    .fail(
                        sink,
                        id,
                        logger,
                        FailureReason::Internal,
                        format!("quota charge failed: {}", e),
                    )
                    .await;
            }
        }

        let mut shutdown = self.shutdown.subscribe();
        let poll = poll_until_terminal(
            self.provider.as_ref(),
            &provider_job_id,
            &self.poll_policy,
            &mut shutdown,
            logger,
        )
        .await;

        match poll {
            PollOutcome::Ready { attempts } => {
                logger.dub_ready(attempts);
            }
            PollOutcome::ProviderFailed(message) => {
                return self
                    .fail(sink, id, logger, FailureReason::ProviderError, message)
                    .await;
            }
            PollOutcome::TimedOut { attempts } => {
                return self
                    .fail(
                        sink,
                        id,
                        logger,
                        FailureReason::Timeout,
                        format!("provider job not ready after {} status checks", attempts),
                    )
                    .await;
            }
            PollOutcome::Interrupted => {
                return self
                    .fail(
                        sink,
                        id,
                        logger,
                        FailureReason::Interrupted,
                        "executor shut down while polling",
                    )
                    .await;
            }
        }

        sink.record(id, Transition::Ready).await?;

        let media = match self
            .provider
            .fetch_result(&provider_job_id, &job.target_language)
            .await
        {
            Ok(media) => media,
            Err(e) => {
                return self
                    .fail(
                        sink,
                        id,
                        logger,
                        FailureReason::ProviderError,
                        format!("fetching result failed: {}", e),
                    )
                    .await;
            }
        };

        let publish_started = Instant::now();
        let published = match self
            .publisher
            .publish(&job.user_id, id, media.bytes, &media.content_type)
            .await
        {
            Ok(published) => published,
            Err(e) => {
                return self
                    .fail(sink, id, logger, FailureReason::PublishError, e.to_string())
                    .await;
            }
        };
        metrics::record_publish_duration("storage", publish_started.elapsed().as_secs_f64());
        logger.published("storage", &published.object_key);

        let job = sink
            .record(
                id,
                Transition::Published {
                    result_url: published.signed_url,
                },
            )
            .await?;

        if job.auto_publish {
            return self.chain_and_complete(&job, sink, logger).await;
        }

        sink.record(id, Transition::Complete).await?;
        Ok(ExecutionOutcome::Completed)
    }

    /// Chain-only retry: the dub is already stored and signed.
    async fn resume_chain(
        &self,
        job: &Job,
        sink: &dyn JobSink,
        logger: &JobLogger,
    ) -> QueueResult<ExecutionOutcome> {
        let job = sink.record(&job.id, Transition::ResumePublish).await?;
        self.chain_and_complete(&job, sink, logger).await
    }

    async fn chain_and_complete(
        &self,
        job: &Job,
        sink: &dyn JobSink,
        logger: &JobLogger,
    ) -> QueueResult<ExecutionOutcome> {
        let id = &job.id;

        let Some(result_url) = job.result_url.as_deref() else {
            return self
                .fail(
                    sink,
                    id,
                    logger,
                    FailureReason::Internal,
                    "chain publish without a stored result",
                )
                .await;
        };

        let Some(chainer) = self.chainer.as_ref() else {
            return self
                .fail(
                    sink,
                    id,
                    logger,
                    FailureReason::PublishError,
                    "chain publish is not configured",
                )
                .await;
        };

        let chain_started = Instant::now();
        match chainer
            .publish(result_url, &job.publish_title(), &job.target_language)
            .await
        {
            Ok(external_video_id) => {
                metrics::record_publish_duration("chain", chain_started.elapsed().as_secs_f64());
                logger.published("chain", &external_video_id);
                sink.record(id, Transition::Chained { external_video_id })
                    .await?;
            }
            Err(e) => {
                return self
                    .fail(
                        sink,
                        id,
                        logger,
                        FailureReason::PublishError,
                        format!("chain publish failed: {}", e),
                    )
                    .await;
            }
        }

        sink.record(id, Transition::Complete).await?;
        Ok(ExecutionOutcome::Completed)
    }

    async fn fail(
        &self,
        sink: &dyn JobSink,
        id: &JobId,
        logger: &JobLogger,
        reason: FailureReason,
        message: impl Into<String>,
    ) -> QueueResult<ExecutionOutcome> {
        let message = message.into();
        logger.failed(reason, &message);
        sink.record(id, Transition::fail(reason, message)).await?;
        Ok(ExecutionOutcome::Failed(reason))
    }
}
