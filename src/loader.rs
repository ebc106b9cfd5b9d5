//! File orchestrator: one input file from open to completion marker.
//!
//! [`FileLoader::process`] opens a file (decompressing transparently), runs
//! the conversion/upload pipeline over it, judges the error rate against the
//! configured threshold, and renames the file so later runs skip it.
//!
//! "Processed" and "accepted" are independent: a file that completes without
//! a fatal error is marked even when its error rate is too high. The verdict
//! is logged and returned; deciding what to do about it is up to the caller.
//!
//! ```no_run
//! use memcload::config::PipelineConfig;
//! use memcload::loader::FileLoader;
//! use memcload::record::DeviceType;
//! use memcload::router::ShardRouter;
//! use memcload::store::MemoryStore;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = PipelineConfig::default();
//! let store = Arc::new(MemoryStore::new("memory"));
//! let mut router = ShardRouter::new();
//! for device_type in DeviceType::ALL {
//!     router.insert(device_type, ShardRouter::client_for(store.clone(), &config));
//! }
//!
//! let loader = FileLoader::new(config, Arc::new(router))?;
//! let outcome = loader.process("20170929000000.tsv.gz")?;
//! println!("{} ok, {} errors", outcome.ok, outcome.error);
//! # Ok(())
//! # }
//! ```

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::{ConfigError, LoadError};
use crate::io::compression::auto_detect_reader;
use crate::io::glob::{PROCESSED_PREFIX, is_marked};
use crate::pipeline;
use crate::router::ShardRouter;
use crate::stats::{FileCounters, FileOutcome};

/// Processes single files against a fixed set of shards.
#[derive(Clone)]
pub struct FileLoader {
    config: PipelineConfig,
    router: Arc<ShardRouter>,
}

impl FileLoader {
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` does not validate.
    pub fn new(config: PipelineConfig, router: Arc<ShardRouter>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, router })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    /// Load one file into the store.
    ///
    /// Re-running on the same content gives the same counts, since parsing
    /// is deterministic and store writes are idempotent.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when the file cannot be opened or read, when it
    /// contains a device type without a shard, or when the marker rename
    /// fails. Bad lines and failed writes are counted, not returned.
    pub fn process(&self, path: impl AsRef<Path>) -> Result<FileOutcome, LoadError> {
        let path = path.as_ref();
        info!(file = %path.display(), "processing");
        let started = Instant::now();

        let reader = open_input(path)?;
        let counters = FileCounters::new();
        let summary = pipeline::run(reader, path, &self.config, &self.router, &counters)?;

        let mut outcome = counters.outcome(path.to_path_buf(), self.config.error_threshold);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if outcome.accepted {
            info!(
                file = %path.display(),
                ok = outcome.ok,
                errors = outcome.error,
                skipped = outcome.skipped,
                lines = summary.lines,
                error_rate = outcome.error_rate,
                elapsed_ms,
                "acceptable error rate, successful load"
            );
        } else {
            error!(
                file = %path.display(),
                ok = outcome.ok,
                errors = outcome.error,
                malformed = outcome.errors_by_reason.malformed_line,
                unknown_device_type = outcome.errors_by_reason.unknown_device_type,
                missing_device_id = outcome.errors_by_reason.missing_device_id,
                write_failed = outcome.errors_by_reason.write_failed,
                error_rate = outcome.error_rate,
                threshold = outcome.threshold,
                elapsed_ms,
                "high error rate, failed load"
            );
        }

        if self.config.mark_processed {
            let marked = mark_processed(path)?;
            info!(file = %path.display(), marked = %marked.display(), "marked as processed");
            outcome.marked_as = Some(marked);
        }
        Ok(outcome)
    }

    /// `(error_count, processed_count)` for one file.
    ///
    /// # Errors
    ///
    /// Same as [`FileLoader::process`].
    pub fn process_counts(&self, path: impl AsRef<Path>) -> Result<(u64, u64), LoadError> {
        self.process(path).map(|outcome| outcome.counts())
    }
}

/// Open `path` for line reading, decompressing if needed.
///
/// # Errors
///
/// Returns [`LoadError::Open`] if the file cannot be opened or the codec fails.
pub fn open_input(path: &Path) -> Result<BufReader<Box<dyn Read>>, LoadError> {
    let open_err = |reason: String| LoadError::Open {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| open_err(e.to_string()))?;
    let reader = auto_detect_reader(file, path).map_err(|e| open_err(format!("{e:#}")))?;
    Ok(BufReader::new(reader))
}

/// Path `path` is moved to by [`mark_processed`].
pub fn marked_path(path: &Path) -> PathBuf {
    if is_marked(path) {
        return path.to_path_buf();
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{PROCESSED_PREFIX}{name}"))
}

/// Rename `path` to its dot-prefixed name in a single `rename` call.
///
/// Idempotent: an already-marked path, or one whose marked twin exists while
/// the unmarked file is gone, is reported as marked without touching the disk.
///
/// # Errors
///
/// Returns [`LoadError::Mark`] if the rename fails.
pub fn mark_processed(path: &Path) -> Result<PathBuf, LoadError> {
    let target = marked_path(path);
    if target == path {
        return Ok(target);
    }
    match fs::rename(path, &target) {
        Ok(()) => Ok(target),
        Err(e) if e.kind() == io::ErrorKind::NotFound && target.exists() => Ok(target),
        Err(source) => Err(LoadError::Mark {
            path: path.to_path_buf(),
            source,
        }),
    }
}
