//! Chained publish of dub results to an external video platform.

pub mod error;
pub mod token;
pub mod youtube;

use async_trait::async_trait;
use dubify_models::TargetLanguage;

pub use error::{ChainError, ChainResult};
pub use token::{OAuthCredentials, TokenCache};
pub use youtube::{YouTubeConfig, YouTubeUploader};

/// Republishes a signed dub result to a video platform.
#[async_trait]
pub trait UploadChainer: Send + Sync {
    /// Publish the media behind `signed_url`; returns the platform video id.
    async fn publish(
        &self,
        signed_url: &str,
        title: &str,
        language: &TargetLanguage,
    ) -> ChainResult<String>;
}
