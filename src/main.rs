//! memcload - load app-install logs into sharded memcached
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result, bail};
use clap::Parser;
use memcload::config::{CliArgs, LoaderConfig};
use memcload::driver::{Driver, discover};
use memcload::loader::FileLoader;
use memcload::logging;
use memcload::router::ShardRouter;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run as a whole succeeded.
fn run() -> Result<bool> {
    let args = CliArgs::parse();
    logging::init(&args.loglevel, args.log.as_deref())?;

    let config = LoaderConfig::from_args(args).context("Invalid configuration")?;
    info!(
        pattern = %config.pattern,
        workers = config.workers,
        uploaders = config.pipeline.uploader_count,
        frame_size = config.pipeline.frame_size,
        dry_run = config.pipeline.dry_run,
        "memcload started"
    );
    for (device_type, addr) in config.endpoints.iter() {
        info!(%device_type, addr, "shard");
    }

    let files = discover(&config.pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {}", config.pattern);
    }

    let router = ShardRouter::memcached(&config.endpoints, &config.pipeline, config.socket_timeout);
    let loader = FileLoader::new(config.pipeline.clone(), Arc::new(router))?;
    let driver = Driver::new(loader, config.workers);

    // Files already in flight finish; the rest are not started
    let shutdown_flag = driver.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing files in progress...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let report = driver.run(&files).context("Load failed")?;

    if let Some(path) = &config.report {
        report.save_to_file(path)?;
        info!(report = %path.display(), "run report written");
    }

    if report.totals.rejected > 0 {
        warn!(rejected = report.totals.rejected, "some files exceeded the error threshold");
    }
    Ok(report.is_success(config.fail_on_rejected))
}
