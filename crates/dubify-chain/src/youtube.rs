//! YouTube Data API v3 uploader.

use std::time::Duration;

use async_trait::async_trait;
use dubify_models::TargetLanguage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ChainError, ChainResult};
use crate::token::{OAuthCredentials, TokenCache};
use crate::UploadChainer;

const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";
const DEFAULT_DESCRIPTION: &str = "#Shorts";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// YouTube caps titles at 100 characters.
const MAX_TITLE_CHARS: usize = 100;

/// Configuration for the YouTube uploader.
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub credentials: OAuthCredentials,
    pub token_url: String,
    pub upload_url: String,
    pub description: String,
    pub tags: Vec<String>,
    /// Timeout for the download and upload requests
    pub timeout: Duration,
}

impl YouTubeConfig {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            tags: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create config from environment variables.
    ///
    /// Returns `None` when any credential is missing; chain publishing is
    /// then disabled.
    pub fn from_env() -> Option<Self> {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let credentials = OAuthCredentials {
            client_id: non_empty("GOOGLE_ID")?,
            client_secret: non_empty("GOOGLE_SECRET")?,
            refresh_token: non_empty("YOUTUBE_REFRESH_TOKEN")?,
        };

        let mut config = Self::new(credentials);
        if let Some(description) = non_empty("YOUTUBE_DESCRIPTION") {
            config.description = description;
        }
        if let Some(tags) = non_empty("YOUTUBE_TAGS") {
            config.tags = tags
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        Some(config)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    default_language: &'a str,
    default_audio_language: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    privacy_status: &'static str,
}

#[derive(Debug, Serialize)]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

/// Uploads signed dub results to the configured YouTube channel as private
/// videos.
pub struct YouTubeUploader {
    client: Client,
    tokens: TokenCache,
    config: YouTubeConfig,
}

impl YouTubeUploader {
    pub fn new(config: YouTubeConfig) -> ChainResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChainError::NotConfigured(format!("Failed to build HTTP client: {}", e)))?;

        let tokens = TokenCache::new(
            client.clone(),
            config.token_url.clone(),
            config.credentials.clone(),
        );

        Ok(Self {
            client,
            tokens,
            config,
        })
    }

    async fn download(&self, signed_url: &str) -> ChainResult<(Vec<u8>, String)> {
        let response = self.client.get(signed_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::download_failed(format!("status {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(ChainError::download_failed("empty body"));
        }
        Ok((bytes, content_type))
    }

    /// Build a `multipart/related` body: JSON metadata followed by the media.
    fn related_body(
        metadata: &[u8],
        media: &[u8],
        media_type: &str,
        boundary: &str,
    ) -> Vec<u8> {
        let mut body = Vec::with_capacity(metadata.len() + media.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.extend_from_slice(metadata);
        body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", media_type).as_bytes());
        body.extend_from_slice(media);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        body
    }
}

#[async_trait]
impl UploadChainer for YouTubeUploader {
    async fn publish(
        &self,
        signed_url: &str,
        title: &str,
        language: &TargetLanguage,
    ) -> ChainResult<String> {
        let access_token = self.tokens.get_token().await?;
        let (media, media_type) = self.download(signed_url).await?;

        let title: String = title.chars().take(MAX_TITLE_CHARS).collect();
        let resource = VideoResource {
            snippet: Snippet {
                title: &title,
                description: &self.config.description,
                tags: &self.config.tags,
                default_language: language.as_str(),
                default_audio_language: language.as_str(),
            },
            status: Status {
                privacy_status: "private",
            },
        };
        let metadata = serde_json::to_vec(&resource)
            .map_err(|e| ChainError::InvalidResponse(format!("metadata encoding: {}", e)))?;

        let boundary = format!("dubify-{}", Uuid::new_v4().simple());
        let body = Self::related_body(&metadata, &media, &media_type, &boundary);
        debug!(size = media.len(), %media_type, "Uploading video to YouTube");

        let response = self
            .client
            .post(&self.config.upload_url)
            .query(&[("uploadType", "multipart"), ("part", "snippet,status")])
            .bearer_auth(&access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 401 {
                self.tokens.invalidate().await;
            }
            let text = response.text().await.unwrap_or_default();
            return Err(ChainError::from_http_status(status.as_u16(), text));
        }

        let inserted: InsertResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        info!(video_id = %inserted.id, language = %language, "Uploaded dub to YouTube");
        Ok(inserted.id)
    }
}
