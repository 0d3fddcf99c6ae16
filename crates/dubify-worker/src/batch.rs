//! Batch wiring: build the queue from the environment, enqueue a batch of
//! requests and drain it.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use dubify_chain::{UploadChainer, YouTubeConfig, YouTubeUploader};
use dubify_models::{DubRequest, JobView, PublishedResult};
use dubify_provider::ElevenLabsClient;
use dubify_quota::{InMemoryQuotaStore, QuotaGate};
use dubify_queue::{DrainReport, JobExecutor, JobQueue, QueueConfig};
use dubify_storage::{
    InMemoryResultStore, PublishedResultStore, PublisherConfig, R2Client, ResultPublisher,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::WorkerConfig;

/// A request refused at enqueue time.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRequest {
    /// Position in the input batch
    pub index: usize,
    pub user_id: String,
    pub source_ref: String,
    pub error: String,
}

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub rejected: Vec<RejectedRequest>,
    pub report: DrainReport,
    pub jobs: Vec<JobView>,
    /// Unexpired published results for every user in the batch
    pub results: Vec<PublishedResult>,
}

/// Parse a JSON array of dub requests.
pub fn parse_requests(json: &str) -> anyhow::Result<Vec<DubRequest>> {
    serde_json::from_str(json).context("jobs file must be a JSON array of dub requests")
}

/// Distinct owners, keyed the same way jobs are (trimmed, blanks skipped).
fn distinct_users(requests: &[DubRequest]) -> BTreeSet<&str> {
    requests
        .iter()
        .map(|r| r.user_id.trim())
        .filter(|u| !u.is_empty())
        .collect()
}

/// Build the queue with production adapters configured from the environment.
///
/// Every user in `requests` is seeded with the configured plan and usage.
pub async fn build_queue(
    config: &WorkerConfig,
    requests: &[DubRequest],
) -> anyhow::Result<(Arc<JobQueue>, Arc<InMemoryResultStore>)> {
    let provider = Arc::new(ElevenLabsClient::from_env().context("ElevenLabs client")?);
    let objects = Arc::new(R2Client::from_env().context("R2 client")?);
    objects
        .check_connectivity()
        .await
        .with_context(|| format!("R2 bucket {} is not reachable", objects.bucket()))?;
    info!(bucket = objects.bucket(), "R2 bucket reachable");
    let records = Arc::new(InMemoryResultStore::new());
    let publisher = ResultPublisher::new(objects, records.clone(), PublisherConfig::from_env());

    let chainer: Option<Arc<dyn UploadChainer>> = match YouTubeConfig::from_env() {
        Some(yt) => Some(Arc::new(YouTubeUploader::new(yt).context("YouTube uploader")?)),
        None => {
            info!("YouTube credentials not set, chain publish disabled");
            None
        }
    };

    let quota =
        Arc::new(InMemoryQuotaStore::new(config.user_plan).with_limits(config.plan_limits));
    for user in distinct_users(requests) {
        quota
            .set_user(user, config.user_plan, config.user_used)
            .await;
    }

    let queue_config = QueueConfig::from_env();
    let executor = JobExecutor::new(
        provider,
        QuotaGate::new(quota),
        publisher,
        chainer,
        queue_config.poll.clone(),
    );

    Ok((Arc::new(JobQueue::new(executor, &queue_config)), records))
}

/// Enqueue every request, drain the queue and collect the outcome.
pub async fn run_batch(
    queue: &JobQueue,
    records: &dyn PublishedResultStore,
    requests: Vec<DubRequest>,
) -> anyhow::Result<BatchSummary> {
    let users: Vec<String> = distinct_users(&requests)
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rejected = Vec::new();
    for (index, request) in requests.into_iter().enumerate() {
        let user_id = request.user_id.clone();
        let source_ref = request.source_ref.clone();
        match queue.enqueue(request).await {
            Ok(job_id) => info!(job_id = %job_id, user_id = %user_id, "Job enqueued"),
            Err(e) => {
                warn!(index, user_id = %user_id, error = %e, "Request rejected");
                rejected.push(RejectedRequest {
                    index,
                    user_id,
                    source_ref,
                    error: e.to_string(),
                });
            }
        }
    }

    let report = queue.drain().await.context("drain failed")?;
    info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        interrupted = report.interrupted,
        "Drain finished"
    );

    let now = Utc::now();
    let mut results = Vec::new();
    for user in &users {
        results.extend(records.list_unexpired(user, now).await?);
    }

    Ok(BatchSummary {
        rejected,
        report,
        jobs: queue.list().await,
        results,
    })
}
