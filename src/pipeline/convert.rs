//! Conversion stage: lines in, frames out.
//!
//! Runs on the thread that owns the input reader. Lines are parsed and
//! encoded strictly in input order; bad lines are counted and logged, never
//! fatal. Sending on the bounded queue blocks while it is full, which keeps
//! the parser from racing ahead of slow uploads.

use crossbeam_channel::Sender;
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

use super::frame::{Frame, FrameBuilder, FrameEntry};
use crate::codec;
use crate::error::{LoadError, ParseError};
use crate::record::{Parsed, parse_line};
use crate::stats::FileCounters;

/// What the conversion stage saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Lines read, including blank and bad ones
    pub lines: u64,
    /// Frames handed to the queue
    pub frames: u64,
    /// Stopped before end of input because the pipeline was aborted
    pub aborted: bool,
}

/// Parse, encode and frame every line of `reader`, sending frames on `sender`.
///
/// # Errors
///
/// Returns [`LoadError::Read`] if reading the input fails. Per-line problems
/// are recorded in `counters` instead.
pub fn run_conversion<R: BufRead>(
    mut reader: R,
    path: &Path,
    frame_size: usize,
    sender: &Sender<Frame>,
    counters: &FileCounters,
    abort: &AtomicBool,
) -> Result<ConversionSummary, LoadError> {
    let mut summary = ConversionSummary::default();
    let mut builder = FrameBuilder::new(frame_size);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                lines: summary.lines,
                source,
            })?;
        if read == 0 {
            break;
        }
        summary.lines += 1;

        let Some(entry) = convert_line(&buf, path, summary.lines, counters) else {
            continue;
        };
        if let Some(frame) = builder.push(entry) {
            if !send_frame(frame, sender, counters, abort) {
                summary.aborted = true;
                return Ok(summary);
            }
            summary.frames += 1;
        }
    }

    if let Some(frame) = builder.finish() {
        if !send_frame(frame, sender, counters, abort) {
            summary.aborted = true;
            return Ok(summary);
        }
        summary.frames += 1;
    }

    debug!(file = %path.display(), lines = summary.lines, frames = summary.frames, "conversion finished");
    Ok(summary)
}

/// Parse and encode one raw line, recording failures and skips.
fn convert_line(
    raw: &[u8],
    path: &Path,
    line_no: u64,
    counters: &FileCounters,
) -> Option<FrameEntry> {
    let parsed = std::str::from_utf8(raw)
        .map_err(|_| ParseError::NotUtf8)
        .and_then(parse_line);

    match parsed {
        Ok(Parsed::Record(record)) => Some(FrameEntry {
            key: record.routing_key(),
            payload: codec::encode(&record),
        }),
        Ok(Parsed::Skip) => {
            counters.record_skip();
            None
        }
        Err(err) => {
            error!(file = %path.display(), line = line_no, reason = err.reason(), %err, "cannot parse line");
            counters.record_parse_error(&err);
            None
        }
    }
}

/// Blocks while the queue is full. Returns false if the pipeline was aborted
/// or every uploader has gone away.
fn send_frame(
    frame: Frame,
    sender: &Sender<Frame>,
    counters: &FileCounters,
    abort: &AtomicBool,
) -> bool {
    if abort.load(Ordering::Acquire) {
        return false;
    }
    if sender.send(frame).is_err() {
        return false;
    }
    counters.record_frame();
    true
}
