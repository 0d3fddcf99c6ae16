//! ElevenLabs dubbing API client.

use std::time::Duration;

use async_trait::async_trait;
use dubify_models::TargetLanguage;
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{DubProvider, DubbedMedia, ProviderStatus};

const DEFAULT_API_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for the ElevenLabs client.
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    /// Base URL without the `/v1` suffix
    pub api_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Request watermarked output (required on lower ElevenLabs tiers)
    pub watermark: bool,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            watermark: true,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .map_err(|_| ProviderError::config_error("ELEVENLABS_API_KEY not set"))?;

        Ok(Self {
            api_key,
            api_url: std::env::var("ELEVENLABS_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("ELEVENLABS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            watermark: std::env::var("ELEVENLABS_WATERMARK")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    dubbing_id: String,
    #[serde(default)]
    expected_duration_sec: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DubbingDetails {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the ElevenLabs dubbing endpoints.
#[derive(Clone)]
pub struct ElevenLabsClient {
    client: Client,
    config: ElevenLabsConfig,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config_error("ElevenLabs API key is empty"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ElevenLabsConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn error_from_response(url: &str, response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ProviderError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[async_trait]
impl DubProvider for ElevenLabsClient {
    async fn submit(
        &self,
        source_ref: &str,
        target_language: &TargetLanguage,
    ) -> ProviderResult<String> {
        let url = self.url("/dubbing");
        debug!(source_ref, target_lang = %target_language, "Submitting dubbing job");

        let form = Form::new()
            .text("mode", "automatic")
            .text("source_url", source_ref.to_string())
            .text("source_lang", "auto")
            .text("target_lang", target_language.as_str().to_string())
            .text("num_speakers", "0")
            .text("highest_resolution", "true")
            .text("watermark", self.config.watermark.to_string());

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(&url, response).await);
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

        if body.dubbing_id.is_empty() {
            return Err(ProviderError::invalid_response("empty dubbing_id"));
        }

        info!(
            provider_job_id = %body.dubbing_id,
            expected_duration_sec = ?body.expected_duration_sec,
            "Dubbing job accepted"
        );
        Ok(body.dubbing_id)
    }

    async fn poll_status(&self, provider_job_id: &str) -> ProviderResult<ProviderStatus> {
        let url = self.url(&format!("/dubbing/{}", urlencoding::encode(provider_job_id)));

        let response = self
            .client
            .get(&url)
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(&url, response).await);
        }

        let details: DubbingDetails = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(e.to_string()))?;

        let status = match details.status.as_str() {
            "dubbed" => ProviderStatus::Ready,
            "error" | "failed" => ProviderStatus::Failed(
                details
                    .error
                    .unwrap_or_else(|| "provider reported an error".to_string()),
            ),
            _ => ProviderStatus::Pending,
        };

        debug!(provider_job_id, raw_status = %details.status, ?status, "Polled dubbing status");
        Ok(status)
    }

    async fn fetch_result(
        &self,
        provider_job_id: &str,
        target_language: &TargetLanguage,
    ) -> ProviderResult<DubbedMedia> {
        let url = self.url(&format!(
            "/dubbing/{}/audio/{}",
            urlencoding::encode(provider_job_id),
            target_language.as_str()
        ));

        let response = self
            .client
            .get(&url)
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                warn!(provider_job_id, "Dubbed media not found");
                return Err(ProviderError::ResultNotFound(format!(
                    "{} ({})",
                    provider_job_id, target_language
                )));
            }
            _ => return Err(Self::error_from_response(&url, response).await),
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(ProviderError::invalid_response("empty dubbed media"));
        }

        info!(provider_job_id, size = bytes.len(), %content_type, "Fetched dubbed media");
        Ok(DubbedMedia::new(bytes, content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ElevenLabsClient {
        let mut config = ElevenLabsConfig::new("test-key");
        config.api_url = server.uri();
        config.timeout = Duration::from_secs(5);
        ElevenLabsClient::new(config).unwrap()
    }

    fn spanish() -> TargetLanguage {
        TargetLanguage::parse("es").unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_dubbing_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/dubbing"))
            .and(header("xi-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dubbing_id": "dub_123",
                "expected_duration_sec": 42.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client_for(&server)
            .submit("https://www.youtube.com/watch?v=abc", &spanish())
            .await
            .unwrap();
        assert_eq!(id, "dub_123");
    }

    #[tokio::test]
    async fn test_submit_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/dubbing"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .submit("https://example.com/v.mp4", &spanish())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ServerError(503, _)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_submit_rejected_source() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/dubbing"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid source_url"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .submit("https://example.com/v.mp4", &spanish())
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_poll_status_mapping() {
        let server = MockServer::start().await;
        for (id, status) in [("a", "dubbing"), ("b", "dubbed"), ("c", "error")] {
            Mock::given(method("GET"))
                .and(path(format!("/v1/dubbing/{}", id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "dubbing_id": id,
                    "status": status,
                    "target_languages": ["es"]
                })))
                .mount(&server)
                .await;
        }

        let client = client_for(&server);
        assert_eq!(client.poll_status("a").await.unwrap(), ProviderStatus::Pending);
        assert_eq!(client.poll_status("b").await.unwrap(), ProviderStatus::Ready);
        assert!(matches!(
            client.poll_status("c").await.unwrap(),
            ProviderStatus::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_result_bytes_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/dubbing/dub_1/audio/es"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2, 3], "video/mp4"))
            .mount(&server)
            .await;

        let media = client_for(&server)
            .fetch_result("dub_1", &spanish())
            .await
            .unwrap();
        assert_eq!(media.bytes, vec![0u8, 1, 2, 3]);
        assert_eq!(media.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_fetch_result_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/dubbing/dub_1/audio/es"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_result("dub_1", &spanish())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ResultNotFound(_)));
    }

    #[test]
    #[serial]
    fn test_config_requires_api_key() {
        std::env::remove_var("ELEVENLABS_API_KEY");
        assert!(ElevenLabsConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        std::env::set_var("ELEVENLABS_API_KEY", "k");
        std::env::remove_var("ELEVENLABS_API_URL");
        std::env::remove_var("ELEVENLABS_TIMEOUT_SECS");
        std::env::remove_var("ELEVENLABS_WATERMARK");

        let config = ElevenLabsConfig::from_env().unwrap();
        assert_eq!(config.api_url, "https://api.elevenlabs.io");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.watermark);

        std::env::remove_var("ELEVENLABS_API_KEY");
    }
}
