//! In-process fakes and a harness for queue scenario tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dubify_chain::{ChainError, ChainResult, UploadChainer};
use dubify_models::{DubRequest, JobId, JobState, JobView, PlanTier, TargetLanguage};
use dubify_provider::{DubProvider, DubbedMedia, ProviderError, ProviderResult, ProviderStatus};
use dubify_queue::{JobExecutor, JobQueue, PollPolicy, QueueConfig};
use dubify_quota::{InMemoryQuotaStore, QuotaGate, QuotaStore};
use dubify_storage::{
    InMemoryResultStore, ObjectStore, PublisherConfig, ResultPublisher, StorageError,
    StorageResult,
};

/// Scriptable dubbing provider.
#[derive(Default)]
pub struct FakeProvider {
    /// Upcoming submit calls that fail
    pub submit_failures: AtomicU32,
    /// Keep reporting `Pending` while set
    pub hold: AtomicBool,
    /// Report a provider-side failure on the next status check
    pub fail_status: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub submits: AtomicU32,
    pub polls: AtomicU32,
    pub fetches: AtomicU32,
    /// Source refs in submission order
    pub submitted: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }
}

#[async_trait]
impl DubProvider for FakeProvider {
    async fn submit(&self, source_ref: &str, _: &TargetLanguage) -> ProviderResult<String> {
        let failures = self.submit_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.submit_failures.store(failures - 1, Ordering::SeqCst);
            return Err(ProviderError::from_http_status(503, "connection reset"));
        }
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted.lock().unwrap().push(source_ref.to_string());
        Ok(format!("dub_{}", n))
    }

    async fn poll_status(&self, _: &str) -> ProviderResult<ProviderStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status.load(Ordering::SeqCst) {
            return Ok(ProviderStatus::Failed("dubbing failed".into()));
        }
        if self.hold.load(Ordering::SeqCst) {
            return Ok(ProviderStatus::Pending);
        }
        Ok(ProviderStatus::Ready)
    }

    async fn fetch_result(&self, _: &str, _: &TargetLanguage) -> ProviderResult<DubbedMedia> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ProviderError::ResultNotFound("gone".into()));
        }
        Ok(DubbedMedia::new(vec![0u8; 64], "video/mp4"))
    }
}

/// In-memory object store.
#[derive(Default)]
pub struct FakeObjects {
    pub fail_put: AtomicBool,
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn put(&self, key: &str, data: Vec<u8>, _: &str) -> StorageResult<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StorageError::upload_failed("bucket unavailable"));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        Ok(format!(
            "https://r2.test/{}?X-Amz-Expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Chain publisher that can be switched to fail.
#[derive(Default)]
pub struct FakeChainer {
    pub fail: AtomicBool,
    pub calls: AtomicU32,
}

impl FakeChainer {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadChainer for FakeChainer {
    async fn publish(&self, _: &str, _: &str, _: &TargetLanguage) -> ChainResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChainError::from_http_status(403, "quotaExceeded"));
        }
        Ok(format!("yt_{}", n))
    }
}

pub struct HarnessOptions {
    pub poll: PollPolicy,
    pub default_plan: PlanTier,
    pub chain: bool,
    pub quota_store: Option<Arc<dyn QuotaStore>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            poll: PollPolicy {
                interval: Duration::from_millis(1),
                max_attempts: 50,
                deadline: None,
            },
            default_plan: PlanTier::Starter,
            chain: true,
            quota_store: None,
        }
    }
}

pub struct Harness {
    pub queue: Arc<JobQueue>,
    pub provider: Arc<FakeProvider>,
    pub quota: Arc<InMemoryQuotaStore>,
    pub objects: Arc<FakeObjects>,
    pub records: Arc<InMemoryResultStore>,
    pub chainer: Arc<FakeChainer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let provider = Arc::new(FakeProvider::default());
        let quota = Arc::new(InMemoryQuotaStore::new(options.default_plan));
        let objects = Arc::new(FakeObjects::default());
        let records = Arc::new(InMemoryResultStore::new());
        let chainer = Arc::new(FakeChainer::default());

        let quota_store: Arc<dyn QuotaStore> = match options.quota_store {
            Some(store) => store,
            None => quota.clone(),
        };
        let publisher = ResultPublisher::new(
            objects.clone(),
            records.clone(),
            PublisherConfig::default(),
        );
        let chain: Option<Arc<dyn UploadChainer>> = if options.chain {
            Some(chainer.clone())
        } else {
            None
        };

        let executor = JobExecutor::new(
            provider.clone(),
            QuotaGate::new(quota_store),
            publisher,
            chain,
            options.poll.clone(),
        );
        let config = QueueConfig {
            poll: options.poll,
            event_capacity: 256,
        };

        Self {
            queue: Arc::new(JobQueue::new(executor, &config)),
            provider,
            quota,
            objects,
            records,
            chainer,
        }
    }

    /// Run `drain` on a background task.
    pub fn spawn_drain(
        &self,
    ) -> tokio::task::JoinHandle<dubify_queue::QueueResult<dubify_queue::DrainReport>> {
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move { queue.drain().await })
    }

    /// Poll `status` until the job reaches `state`.
    pub async fn wait_for_state(&self, id: &JobId, state: JobState) -> JobView {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let view = self.queue.status(id).await.expect("job exists");
            if view.state == state {
                return view;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} stuck in {} waiting for {}",
                id,
                view.state,
                state
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

pub fn request(user: &str, source: &str) -> DubRequest {
    DubRequest::new(user, source, "es")
}
