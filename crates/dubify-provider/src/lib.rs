//! Dubbing provider boundary.
//!
//! The orchestrator talks to the external dubbing service only through
//! [`DubProvider`]: submit a job, poll its status, fetch the dubbed media.
//! [`ElevenLabsClient`] is the HTTP implementation.

pub mod elevenlabs;
pub mod error;
pub mod provider;

pub use elevenlabs::{ElevenLabsClient, ElevenLabsConfig};
pub use error::{ProviderError, ProviderResult};
pub use provider::{DubProvider, DubbedMedia, ProviderStatus};
