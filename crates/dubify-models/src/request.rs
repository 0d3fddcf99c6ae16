//! Caller-facing dub request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{ModelError, ModelResult};
use crate::language::TargetLanguage;

/// Request to dub one source video into one language.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct DubRequest {
    /// Owner of the job
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: String,
    /// Video URL or uploaded blob reference
    #[validate(custom(function = "validate_source_ref"))]
    pub source_ref: String,
    /// Output language code
    #[validate(custom(function = "validate_language"))]
    pub target_language: String,
    /// Chain-publish the result once dubbed
    #[serde(default)]
    pub auto_publish: bool,
    /// Optional title for the chain publish (upload platform caps titles at 100 chars)
    #[serde(default)]
    #[validate(length(max = 100, message = "title is too long"))]
    pub title: Option<String>,
}

impl DubRequest {
    pub fn new(
        user_id: impl Into<String>,
        source_ref: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source_ref: source_ref.into(),
            target_language: target_language.into(),
            auto_publish: false,
            title: None,
        }
    }

    pub fn with_auto_publish(mut self, auto_publish: bool) -> Self {
        self.auto_publish = auto_publish;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Validate the request and return the parsed language.
    pub fn validated_language(&self) -> ModelResult<TargetLanguage> {
        self.validate()
            .map_err(|e| ModelError::validation(e.to_string()))?;
        TargetLanguage::parse(&self.target_language)
    }
}

fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        let mut err = ValidationError::new("user_id_missing");
        err.message = Some("user_id is required".into());
        return Err(err);
    }
    Ok(())
}

/// Accepts http(s) URLs and `blob:`/`upload:` style references to
/// already-uploaded media.
fn validate_source_ref(source_ref: &str) -> Result<(), ValidationError> {
    let trimmed = source_ref.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("source_ref_missing"));
    }

    match url::Url::parse(trimmed) {
        Ok(url) => match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(()),
            "blob" | "upload" => Ok(()),
            _ => Err(ValidationError::new("source_ref_scheme")),
        },
        Err(_) => Err(ValidationError::new("source_ref_invalid")),
    }
}

fn validate_language(code: &str) -> Result<(), ValidationError> {
    TargetLanguage::parse(code)
        .map(|_| ())
        .map_err(|_| ValidationError::new("unsupported_language"))
}
