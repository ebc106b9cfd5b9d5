//! Retrying, dry-run aware writer for one shard.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::KvStore;
use crate::error::StoreError;

/// Fixed-delay retry policy for store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per write, including the first one
    pub max_attempts: u32,
    /// Pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// What happened to a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Value is in the store
    Stored { attempts: u32 },
    /// Dry run: nothing was sent
    DryRun,
    /// Gave up; either retries were exhausted or the error was not retryable
    Failed { attempts: u32, error: StoreError },
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, WriteOutcome::Failed { .. })
    }
}

/// Writes to one shard with retries, or only logs them in dry-run mode.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn KvStore>,
    policy: RetryPolicy,
    dry_run: bool,
}

impl StoreClient {
    pub fn new(store: Arc<dyn KvStore>, policy: RetryPolicy, dry_run: bool) -> Self {
        Self {
            store,
            policy,
            dry_run,
        }
    }

    pub fn addr(&self) -> &str {
        self.store.addr()
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Write `payload` under `key`.
    ///
    /// Transient failures are retried up to `max_attempts` total attempts
    /// with a fixed delay between them. Non-retryable failures give up at
    /// once. Never panics and never aborts the caller.
    pub fn write(&self, key: &str, payload: &[u8]) -> WriteOutcome {
        if self.dry_run {
            debug!(addr = %self.store.addr(), key, bytes = payload.len(), "dry run: would set");
            return WriteOutcome::DryRun;
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.set(key, payload) {
                Ok(()) => return WriteOutcome::Stored { attempts: attempt },
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    warn!(key, attempt, %error, "store write failed, retrying");
                    if !self.policy.delay.is_zero() {
                        std::thread::sleep(self.policy.delay);
                    }
                }
                Err(error) => {
                    return WriteOutcome::Failed {
                        attempts: attempt,
                        error,
                    };
                }
            }
        }
    }
}
