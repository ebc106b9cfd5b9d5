//! Key-value store access.
//!
//! - [`KvStore`]: the minimal `set`/`get` interface a shard must offer
//! - [`MemcacheStore`]: memcached text protocol over pooled TCP connections
//! - [`MemoryStore`]: in-memory store for tests and local validation
//! - [`StoreClient`]: retry policy and dry-run handling on top of one shard

pub mod client;
pub mod memcache;
pub mod memory;

pub use client::{RetryPolicy, StoreClient, WriteOutcome};
pub use memcache::MemcacheStore;
pub use memory::MemoryStore;

use crate::error::StoreError;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A single store endpoint.
///
/// Implementations must be safe to share across upload workers and files.
/// `set` must be idempotent: writing the same key and value twice leaves the
/// store in the same state as writing it once.
pub trait KvStore: Send + Sync {
    /// Address this store talks to, for logging
    fn addr(&self) -> &str;

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`]; check [`StoreError::is_retryable`] before retrying.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Fetch the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be reached or replies badly.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
}
