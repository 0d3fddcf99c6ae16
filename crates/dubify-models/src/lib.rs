//! Shared data models for the Dubify dubbing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Dub jobs, their lifecycle states and transitions
//! - Caller-facing dub requests and job views
//! - Target languages supported by the dubbing provider
//! - Plan tiers, quota records and published results

pub mod error;
pub mod job;
pub mod language;
pub mod plan;
pub mod published;
pub mod quota;
pub mod request;

pub use error::{ModelError, ModelResult};
pub use job::{FailureReason, Job, JobFailure, JobId, JobState, JobView, RetryMode, Transition};
pub use language::{TargetLanguage, SUPPORTED_LANGUAGES};
pub use plan::{PlanLimits, PlanTier};
pub use published::PublishedResult;
pub use quota::{current_period_key, period_key_for, QuotaRecord};
pub use request::DubRequest;
