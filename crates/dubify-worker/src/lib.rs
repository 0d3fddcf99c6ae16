//! Batch dubbing worker.
//!
//! Wires the ElevenLabs provider, R2 publisher and optional YouTube chain
//! into a [`dubify_queue::JobQueue`], then enqueues and drains a batch of
//! requests.

pub mod batch;
pub mod config;

pub use batch::{build_queue, parse_requests, run_batch, BatchSummary, RejectedRequest};
pub use config::WorkerConfig;
