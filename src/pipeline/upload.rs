//! Upload stage: frames in, store writes out.
//!
//! Each worker pulls whole frames off the shared queue until it is closed and
//! drained. Writes for one shard failing does not affect other shards: every
//! entry is routed and counted on its own.

use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

use super::frame::Frame;
use crate::error::LoadError;
use crate::router::ShardRouter;
use crate::stats::FileCounters;
use crate::store::WriteOutcome;

/// Per-worker tally, mostly for debug logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub frames: u64,
    pub written: u64,
    pub failed: u64,
}

/// Drain `receiver`, writing every entry to its shard.
///
/// # Errors
///
/// Returns [`LoadError::Config`] when an entry's device type has no shard.
/// The abort flag is raised first so the producer and sibling workers stop.
pub fn run_uploader(
    id: usize,
    receiver: Receiver<Frame>,
    router: &ShardRouter,
    counters: &FileCounters,
    abort: &AtomicBool,
) -> Result<UploadSummary, LoadError> {
    let mut summary = UploadSummary::default();

    for frame in receiver.iter() {
        if abort.load(Ordering::Acquire) {
            break;
        }
        summary.frames += 1;

        for entry in frame {
            let client = match router.route(entry.key.device_type) {
                Ok(client) => client,
                Err(err) => {
                    abort.store(true, Ordering::Release);
                    error!(worker = id, %err, "aborting file pipeline");
                    return Err(err.into());
                }
            };

            let key = entry.key.store_key();
            match client.write(&key, &entry.payload) {
                WriteOutcome::Stored { .. } | WriteOutcome::DryRun => {
                    counters.record_ok();
                    summary.written += 1;
                }
                WriteOutcome::Failed { attempts, error } => {
                    error!(worker = id, shard = %client.addr(), key, attempts, %error, "cannot write to memcached");
                    counters.record_write_error();
                    summary.failed += 1;
                }
            }
        }
    }

    debug!(
        worker = id,
        frames = summary.frames,
        written = summary.written,
        failed = summary.failed,
        "uploader finished"
    );
    Ok(summary)
}
