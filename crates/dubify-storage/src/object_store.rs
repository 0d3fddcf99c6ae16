//! Object storage boundary.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Blob storage with time-limited URL signing.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under `key`.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Mint a time-limited GET URL for `key`.
    async fn presign(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    async fn delete(&self, key: &str) -> StorageResult<()>;
}
