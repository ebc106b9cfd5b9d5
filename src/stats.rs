//! Per-file counters and outcomes.
//!
//! [`FileCounters`] is the only mutable state shared by the stages of one
//! file's pipeline. Every field is an atomic so that the parser and any
//! number of upload workers can increment it without locking. Once both
//! stages have drained, [`FileCounters::outcome`] takes an immutable
//! [`FileOutcome`] snapshot.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ParseError;

/// Live counters for one file.
#[derive(Debug, Default)]
pub struct FileCounters {
    ok: AtomicU64,
    error: AtomicU64,
    skipped: AtomicU64,
    malformed_line: AtomicU64,
    unknown_device_type: AtomicU64,
    missing_device_id: AtomicU64,
    write_failed: AtomicU64,
    frames: AtomicU64,
}

impl FileCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ok(&self) {
        self.ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self, err: &ParseError) {
        let reason = match err {
            ParseError::MalformedLine { .. } | ParseError::NotUtf8 => &self.malformed_line,
            ParseError::UnknownDeviceType(_) => &self.unknown_device_type,
            ParseError::MissingDeviceId => &self.missing_device_id,
        };
        reason.fetch_add(1, Ordering::Relaxed);
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_error(&self) {
        self.write_failed.fetch_add(1, Ordering::Relaxed);
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ok(&self) -> u64 {
        self.ok.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.error.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Freeze the counters into an outcome judged against `threshold`.
    pub fn outcome(&self, path: PathBuf, threshold: f64) -> FileOutcome {
        FileOutcome::new(
            path,
            self.ok(),
            self.errors(),
            self.skipped(),
            ErrorBreakdown {
                malformed_line: self.malformed_line.load(Ordering::Relaxed),
                unknown_device_type: self.unknown_device_type.load(Ordering::Relaxed),
                missing_device_id: self.missing_device_id.load(Ordering::Relaxed),
                write_failed: self.write_failed.load(Ordering::Relaxed),
            },
            threshold,
        )
    }
}

/// Errors of one file split by cause; the fields sum to `FileOutcome::error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorBreakdown {
    pub malformed_line: u64,
    pub unknown_device_type: u64,
    pub missing_device_id: u64,
    pub write_failed: u64,
}

impl ErrorBreakdown {
    pub fn total(&self) -> u64 {
        self.malformed_line + self.unknown_device_type + self.missing_device_id + self.write_failed
    }
}

/// Final, immutable result of processing one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub ok: u64,
    pub error: u64,
    pub skipped: u64,
    pub errors_by_reason: ErrorBreakdown,
    pub error_rate: f64,
    pub threshold: f64,
    pub accepted: bool,
    /// Where the file was moved by the completion marker, if it was
    pub marked_as: Option<PathBuf>,
}

impl FileOutcome {
    pub fn new(
        path: PathBuf,
        ok: u64,
        error: u64,
        skipped: u64,
        errors_by_reason: ErrorBreakdown,
        threshold: f64,
    ) -> Self {
        let error_rate = error_rate(ok, error);
        Self {
            path,
            ok,
            error,
            skipped,
            errors_by_reason,
            error_rate,
            threshold,
            accepted: error_rate < threshold,
            marked_as: None,
        }
    }

    /// Records that were either written or failed
    pub fn processed(&self) -> u64 {
        self.ok + self.error
    }

    /// `(error_count, processed_count)`
    pub fn counts(&self) -> (u64, u64) {
        (self.error, self.processed())
    }
}

/// `error / (error + ok)`; a file with nothing countable is a total failure.
pub fn error_rate(ok: u64, error: u64) -> f64 {
    let processed = ok + error;
    if processed == 0 {
        1.0
    } else {
        error as f64 / processed as f64
    }
}
