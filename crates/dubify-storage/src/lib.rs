//! Result storage for dubbed media.
//!
//! This crate provides:
//! - The [`ObjectStore`] boundary and its Cloudflare R2 implementation
//! - Presigned GET URL generation
//! - A record store for published results, scoped per user
//! - [`ResultPublisher`], which stores, signs and records a dub result

pub mod client;
pub mod error;
pub mod object_store;
pub mod publisher;
pub mod records;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use object_store::ObjectStore;
pub use publisher::{extension_for, PublisherConfig, ResultPublisher, DEFAULT_URL_EXPIRY_SECS, MAX_EXPIRY_SECS};
pub use records::{InMemoryResultStore, PublishedResultStore};
