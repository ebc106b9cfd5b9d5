//! Top-level driver: a pool of file loaders over the discovered inputs.
//!
//! Files share no mutable state. Their indices are queued in discovery order
//! on a crossbeam channel and `workers` threads of a `rayon` pool take them
//! one at a time, so files start in sorted order. A shared shutdown flag
//! stops dispatch of files that have not started yet; files already in
//! flight run to completion so that nothing is left half-marked.

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::io::glob::expand_glob;
use crate::loader::FileLoader;
use crate::stats::FileOutcome;

/// Unprocessed input files for `pattern`, in run order.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or the directory cannot be read.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    info!(pattern, files = files.len(), "discovered input files");
    Ok(files)
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileReport {
    /// Processed to the end; `accepted` says whether the error rate was acceptable
    Loaded(FileOutcome),
    /// Aborted by a fatal error
    Failed { path: PathBuf, error: String },
    /// Not dispatched because shutdown was requested
    NotStarted { path: PathBuf },
}

impl FileReport {
    pub fn path(&self) -> &Path {
        match self {
            Self::Loaded(outcome) => &outcome.path,
            Self::Failed { path, .. } | Self::NotStarted { path } => path,
        }
    }

    pub fn outcome(&self) -> Option<&FileOutcome> {
        match self {
            Self::Loaded(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Sums over every file of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub files: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub not_started: u64,
    pub ok: u64,
    pub error: u64,
    pub skipped: u64,
}

impl RunTotals {
    fn add(&mut self, report: &FileReport) {
        self.files += 1;
        match report {
            FileReport::Loaded(outcome) => {
                if outcome.accepted {
                    self.accepted += 1;
                } else {
                    self.rejected += 1;
                }
                self.ok += outcome.ok;
                self.error += outcome.error;
                self.skipped += outcome.skipped;
            }
            FileReport::Failed { .. } => self.failed += 1,
            FileReport::NotStarted { .. } => self.not_started += 1,
        }
    }
}

/// Result of a whole run, in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub totals: RunTotals,
    pub elapsed_ms: u64,
    pub interrupted: bool,
}

impl RunReport {
    pub fn new(files: Vec<FileReport>, elapsed_ms: u64) -> Self {
        let mut totals = RunTotals::default();
        for report in &files {
            totals.add(report);
        }
        Self {
            interrupted: totals.not_started > 0,
            files,
            totals,
            elapsed_ms,
        }
    }

    /// A run succeeds when no file failed fatally and none was left
    /// unprocessed. Rejected files only count with `fail_on_rejected`.
    pub fn is_success(&self, fail_on_rejected: bool) -> bool {
        self.totals.failed == 0
            && !self.interrupted
            && (!fail_on_rejected || self.totals.rejected == 0)
    }

    /// Write the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(self)?;
        let mut file =
            File::create(path).with_context(|| format!("create report {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write report {}", path.display()))?;
        Ok(())
    }
}

/// Runs a [`FileLoader`] over many files in parallel.
pub struct Driver {
    loader: FileLoader,
    workers: usize,
    shutdown: Arc<AtomicBool>,
}

impl Driver {
    pub fn new(loader: FileLoader, workers: usize) -> Self {
        Self {
            loader,
            workers: workers.max(1),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that, once set, stops dispatching new files.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Process `files`, returning one report entry per file in input order.
    ///
    /// # Errors
    ///
    /// Returns an error only if the thread pool cannot be built. File-level
    /// failures are recorded in the report.
    pub fn run(&self, files: &[PathBuf]) -> Result<RunReport> {
        let started = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("memcload-file-{i}"))
            .build()
            .context("failed to create file worker pool")?;

        let (job_tx, job_rx) = bounded::<usize>(files.len().max(1));
        for index in 0..files.len() {
            let _ = job_tx.send(index);
        }
        drop(job_tx);

        let (done_tx, done_rx) = bounded::<(usize, FileReport)>(files.len().max(1));
        pool.scope(|scope| {
            for _ in 0..self.workers.min(files.len()) {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                scope.spawn(move |_| {
                    for index in job_rx {
                        let _ = done_tx.send((index, self.process_one(&files[index])));
                    }
                });
            }
        });
        drop(done_tx);

        let mut slots: Vec<Option<FileReport>> = vec![None; files.len()];
        for (index, report) in done_rx {
            slots[index] = Some(report);
        }
        let reports: Vec<FileReport> = slots.into_iter().flatten().collect();

        let report = RunReport::new(reports, started.elapsed().as_millis() as u64);
        if report.interrupted {
            warn!(not_started = report.totals.not_started, "run interrupted before all files were dispatched");
        }
        info!(
            files = report.totals.files,
            accepted = report.totals.accepted,
            rejected = report.totals.rejected,
            failed = report.totals.failed,
            ok = report.totals.ok,
            errors = report.totals.error,
            elapsed_ms = report.elapsed_ms,
            "run finished"
        );
        Ok(report)
    }

    fn process_one(&self, path: &Path) -> FileReport {
        if self.shutdown.load(Ordering::SeqCst) {
            return FileReport::NotStarted {
                path: path.to_path_buf(),
            };
        }
        match self.loader.process(path) {
            Ok(outcome) => FileReport::Loaded(outcome),
            Err(err) => {
                let err = anyhow::Error::new(err);
                error!(file = %path.display(), "{err:#}");
                FileReport::Failed {
                    path: path.to_path_buf(),
                    error: format!("{err:#}"),
                }
            }
        }
    }
}
