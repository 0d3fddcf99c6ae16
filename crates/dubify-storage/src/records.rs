//! Published result records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dubify_models::PublishedResult;
use tokio::sync::RwLock;

use crate::error::StorageResult;

/// Persistence for published results, scoped per user.
#[async_trait]
pub trait PublishedResultStore: Send + Sync {
    async fn save(&self, result: PublishedResult) -> StorageResult<()>;

    /// A user's results still valid at `now`, newest first.
    async fn list_unexpired(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<PublishedResult>>;
}

/// In-process record store.
#[derive(Default)]
pub struct InMemoryResultStore {
    results: RwLock<Vec<PublishedResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[async_trait]
impl PublishedResultStore for InMemoryResultStore {
    async fn save(&self, result: PublishedResult) -> StorageResult<()> {
        self.results.write().await.push(result);
        Ok(())
    }

    async fn list_unexpired(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<PublishedResult>> {
        let mut results: Vec<_> = self
            .results
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && !r.is_expired_at(now))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }
}
