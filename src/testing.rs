//! Helpers for testing loaders without a memcached fleet.
//!
//! - [`write_lines`] / [`write_gz_lines`]: write fixture input files
//! - [`memory_router`]: a [`ShardRouter`] with one [`MemoryStore`] per device type
//! - [`FlakyStore`]: a [`KvStore`] wrapper that fails on demand
//! - [`UnreachableStore`]: a shard that always refuses connections
//!
//! ```no_run
//! use memcload::config::PipelineConfig;
//! use memcload::loader::FileLoader;
//! use memcload::testing::{SAMPLE_LINES, memory_router, write_gz_lines};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let path = write_gz_lines(dir.path(), "sample.tsv.gz", SAMPLE_LINES)?;
//! let config = PipelineConfig::default();
//! let (router, stores) = memory_router(&config);
//! let outcome = FileLoader::new(config, Arc::new(router))?.process(&path)?;
//! assert_eq!(outcome.ok as usize, stores.values().map(|s| s.len()).sum::<usize>());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::PipelineConfig;
use crate::error::StoreError;
use crate::io::compression::auto_detect_writer;
use crate::record::DeviceType;
use crate::router::ShardRouter;
use crate::store::{KvStore, MemoryStore, StoreResult};

/// Five well-formed records, one per line, covering every device type.
pub const SAMPLE_LINES: &[&str] = &[
    "idfa\t1rfw452y52g2gq4g\t55.55\t42.42\t1423,43,567,3,7,23",
    "idfa\t2rfw452y52g2gq4g\t55.55\t42.42\t7423,424",
    "gaid\t3rfw452y52g2gq4g\t55.55\t42.42\t1,2,3",
    "adid\t4rfw452y52g2gq4g\t-10.0\t160.5\t5",
    "dvid\t5rfw452y52g2gq4g\t0\t0\t9",
];

/// Write `lines` to `path`, newline-terminated, compressing by extension.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_lines<S: AsRef<str>>(path: impl AsRef<Path>, lines: &[S]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = auto_detect_writer(file, path)?;
    for line in lines {
        writer.write_all(line.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `lines` as a gzip file called `name` inside `dir`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
#[cfg(feature = "compression-gzip")]
pub fn write_gz_lines<S: AsRef<str>>(dir: &Path, name: &str, lines: &[S]) -> Result<PathBuf> {
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    for line in lines {
        encoder.write_all(line.as_ref().as_bytes())?;
        encoder.write_all(b"\n")?;
    }
    encoder.finish()?;
    Ok(path)
}

/// Router with a separate [`MemoryStore`] for every device type.
pub fn memory_router(config: &PipelineConfig) -> (ShardRouter, HashMap<DeviceType, MemoryStore>) {
    let mut router = ShardRouter::new();
    let mut stores = HashMap::new();
    for device_type in DeviceType::ALL {
        let store = MemoryStore::new(format!("memory-{device_type}"));
        router.insert(
            device_type,
            ShardRouter::client_for(Arc::new(store.clone()), config),
        );
        stores.insert(device_type, store);
    }
    (router, stores)
}

/// When a [`FlakyStore`] fails its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Fail the first `n` writes, then delegate
    First(u32),
    Always,
}

/// Wraps a [`MemoryStore`] and fails `set` calls with a chosen error.
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    mode: FailureMode,
    error: StoreError,
    attempts: Arc<AtomicU32>,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore, mode: FailureMode, error: StoreError) -> Self {
        Self {
            inner,
            mode,
            error,
            attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fails with a retryable timeout.
    pub fn timing_out(inner: MemoryStore, mode: FailureMode) -> Self {
        let error = StoreError::Timeout {
            addr: inner.addr().to_string(),
        };
        Self::new(inner, mode, error)
    }

    /// `set` calls seen so far, failed or not
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl KvStore for FlakyStore {
    fn addr(&self) -> &str {
        self.inner.addr()
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let seen = self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = match self.mode {
            FailureMode::First(n) => seen < n,
            FailureMode::Always => true,
        };
        if fail {
            return Err(self.error.clone());
        }
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }
}

/// A shard whose every request fails with a connection error.
#[derive(Debug, Clone)]
pub struct UnreachableStore {
    addr: String,
}

impl UnreachableStore {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    fn refused(&self) -> StoreError {
        StoreError::Connection {
            addr: self.addr.clone(),
            reason: "connection refused".to_string(),
        }
    }
}

impl KvStore for UnreachableStore {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn set(&self, _key: &str, _value: &[u8]) -> StoreResult<()> {
        Err(self.refused())
    }

    fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Err(self.refused())
    }
}
