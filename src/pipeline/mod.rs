//! Producer/consumer pipeline for a single input file.
//!
//! ```text
//!   reader ──► [convert] ──► bounded queue of Frames ──► [upload x N] ──► shards
//!                  │                                          │
//!                  └──────────────► FileCounters ◄────────────┘
//! ```
//!
//! One conversion stage runs on the calling thread; `uploader_count` upload
//! workers run as scoped threads. Dropping the only sender closes the queue,
//! and workers exit once it is drained. [`run`] returns only after every
//! worker has been joined, so the counters are final when it returns.

pub mod convert;
pub mod frame;
pub mod upload;

pub use convert::{ConversionSummary, run_conversion};
pub use frame::{Frame, FrameBuilder, FrameEntry};
pub use upload::{UploadSummary, run_uploader};

use crossbeam_channel::bounded;
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::config::PipelineConfig;
use crate::error::LoadError;
use crate::router::ShardRouter;
use crate::stats::FileCounters;

/// Run conversion and upload for `reader` until both stages have drained.
///
/// # Errors
///
/// Returns the first fatal error: a read failure from the conversion stage,
/// a missing shard from an upload worker, or a worker panic.
pub fn run<R: BufRead>(
    reader: R,
    path: &Path,
    config: &PipelineConfig,
    router: &ShardRouter,
    counters: &FileCounters,
) -> Result<ConversionSummary, LoadError> {
    let (sender, receiver) = bounded::<Frame>(config.queue_capacity.max(1));
    let abort = AtomicBool::new(false);

    thread::scope(|scope| {
        let workers: Vec<_> = (0..config.uploader_count.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                let abort = &abort;
                scope.spawn(move || run_uploader(id, receiver, router, counters, abort))
            })
            .collect();
        drop(receiver);

        let converted = run_conversion(reader, path, config.frame_size, &sender, counters, &abort);
        drop(sender);
        if converted.is_err() {
            abort.store(true, Ordering::Release);
        }

        let mut first_error = None;
        for (id, worker) in workers.into_iter().enumerate() {
            let failure = match worker.join() {
                Ok(Ok(_)) => None,
                Ok(Err(err)) => Some(err),
                Err(_) => Some(LoadError::WorkerPanicked { id }),
            };
            if first_error.is_none() {
                first_error = failure;
            }
        }

        match (converted, first_error) {
            (Err(err), _) | (Ok(_), Some(err)) => Err(err),
            (Ok(summary), None) => Ok(summary),
        }
    })
}
