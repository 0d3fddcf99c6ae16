//! Store-then-sign publishing of dub results.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dubify_models::{JobId, PublishedResult};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::object_store::ObjectStore;
use crate::records::PublishedResultStore;

/// Default signed URL lifetime (7 days).
pub const DEFAULT_URL_EXPIRY_SECS: u64 = 604800;

/// Maximum allowed expiry (7 days) to prevent long-lived URL leakage.
pub const MAX_EXPIRY_SECS: u64 = 604800;

const DEFAULT_KEY_PREFIX: &str = "dubs";

/// Publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Signed URL lifetime, capped at [`MAX_EXPIRY_SECS`]
    pub url_expiry: Duration,
    /// Leading path segment of every object key
    pub key_prefix: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            url_expiry: Duration::from_secs(DEFAULT_URL_EXPIRY_SECS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl PublisherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            url_expiry: Duration::from_secs(
                std::env::var("RESULT_URL_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_URL_EXPIRY_SECS)
                    .min(MAX_EXPIRY_SECS),
            ),
            key_prefix: std::env::var("RESULT_KEY_PREFIX")
                .ok()
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
        }
    }

    pub fn with_url_expiry(mut self, expiry: Duration) -> Self {
        self.url_expiry = expiry.min(Duration::from_secs(MAX_EXPIRY_SECS));
        self
    }
}

/// File extension for a media content type.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/aac" => "aac",
        _ => "bin",
    }
}

/// Stores a dub result, signs a time-limited URL for it and records it for
/// the owning user.
///
/// A failure at any step returns an error and leaves no record. An object
/// whose URL could not be signed is deleted on a best-effort basis.
#[derive(Clone)]
pub struct ResultPublisher {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn PublishedResultStore>,
    config: PublisherConfig,
}

impl ResultPublisher {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn PublishedResultStore>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            objects,
            records,
            config,
        }
    }

    /// Fresh, unique key for one publish of a job's result.
    pub fn object_key(&self, user_id: &str, job_id: &JobId, content_type: &str) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.config.key_prefix,
            user_id,
            job_id,
            Uuid::new_v4(),
            extension_for(content_type)
        )
    }

    pub async fn publish(
        &self,
        user_id: &str,
        job_id: &JobId,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<PublishedResult> {
        if user_id.is_empty() {
            return Err(StorageError::InvalidKey("empty user id".to_string()));
        }

        let key = self.object_key(user_id, job_id, content_type);
        let size = data.len();

        self.objects.put(&key, data, content_type).await?;

        let signed_url = match self.objects.presign(&key, self.config.url_expiry).await {
            Ok(url) => url,
            Err(e) => {
                self.discard(&key).await;
                return Err(e);
            }
        };

        let created_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.url_expiry)
            .map_err(|e| StorageError::presign_failed(e.to_string()))?;

        let result = PublishedResult {
            job_id: job_id.clone(),
            user_id: user_id.to_string(),
            object_key: key.clone(),
            signed_url,
            expires_at: created_at + ttl,
            created_at,
        };

        if let Err(e) = self.records.save(result.clone()).await {
            self.discard(&key).await;
            return Err(StorageError::record_failed(e.to_string()));
        }

        info!(
            job_id = %job_id,
            user_id,
            key = %key,
            size,
            expires_at = %result.expires_at,
            "Published dub result"
        );
        Ok(result)
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.objects.delete(key).await {
            warn!(key, error = %e, "Failed to delete orphaned object");
        }
    }
}
