//! Input discovery.
//!
//! Expands the configured glob pattern into the list of files a run should
//! process. Files already carrying the completion marker (a leading `.` in
//! the file name) are left out, so re-running the loader over the same
//! directory only picks up new files.
//!
//! ```no_run
//! use memcload::io::glob::expand_glob;
//!
//! let files = expand_glob("/data/appsinstalled/*.tsv.gz")?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::{Path, PathBuf};

/// Prefix that marks a file as already processed
pub const PROCESSED_PREFIX: char = '.';

/// Whether `path`'s file name carries the completion marker.
pub fn is_marked(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(PROCESSED_PREFIX))
}

/// Expand `pattern` into unprocessed regular files, sorted by file name
/// (then by full path) for a reproducible run order.
///
/// No matches is not an error; see [`expand_glob_required`].
///
/// # Errors
///
/// Returns an error if the pattern is invalid or a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() && !is_marked(&path) {
            result.push(path);
        }
    }

    result.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    Ok(result)
}

/// Like [`expand_glob`], but zero matches is an error.
///
/// # Errors
///
/// Returns an error if the pattern is invalid, an entry cannot be read, or
/// nothing matched.
pub fn expand_glob_required(pattern: &str) -> Result<Vec<PathBuf>> {
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {pattern}");
    }
    Ok(files)
}
