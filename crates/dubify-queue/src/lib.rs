//! Dubbing job pipeline orchestrator.
//!
//! This crate provides:
//! - [`JobQueue`]: the job arena, FIFO waiting order and single-active-job drain
//! - [`JobExecutor`]: drives one job through admission, submission, polling,
//!   publishing and the optional chain publish
//! - Bounded, cancellable provider polling
//! - Job lifecycle events, structured job logging and metrics

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod poll;
pub mod queue;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use events::JobEvent;
pub use executor::{ExecutionOutcome, JobExecutor, JobSink};
pub use logging::JobLogger;
pub use poll::{PollOutcome, PollPolicy};
pub use queue::{DrainReport, JobQueue};
