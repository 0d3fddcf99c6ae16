//! Quota admission for dub jobs.
//!
//! This crate provides:
//! - The [`QuotaStore`] boundary with an atomic increment-if-below-limit primitive
//! - An in-process store with month-based usage periods
//! - [`QuotaGate`], which admits jobs and charges usage after provider acceptance

pub mod error;
pub mod gate;
pub mod memory;
pub mod store;

pub use error::{QuotaError, QuotaResult};
pub use gate::{Admission, QuotaGate};
pub use memory::InMemoryQuotaStore;
pub use store::{IncrementOutcome, QuotaStore};
