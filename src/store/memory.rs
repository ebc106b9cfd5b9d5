//! In-memory [`KvStore`], used by tests and for validating input locally.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{KvStore, StoreResult};

/// Thread-safe in-memory shard. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    addr: String,
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    sets: Arc<AtomicU64>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Number of distinct keys held
    pub fn len(&self) -> usize {
        self.data.lock().expect("memory store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `set` calls received, including overwrites
    pub fn set_calls(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    /// Sorted list of stored keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .lock()
            .expect("memory store mutex poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl KvStore for MemoryStore {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.data
            .lock()
            .expect("memory store mutex poisoned")
            .insert(key.to_string(), value.to_vec());
        self.sets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .data
            .lock()
            .expect("memory store mutex poisoned")
            .get(key)
            .cloned())
    }
}
