//! Configuration types for memcload
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros ([`CliArgs`])
//! - Runtime configuration with validation ([`LoaderConfig`])
//! - The per-file pipeline settings consumed by the core ([`PipelineConfig`])
//! - Shard endpoint mapping ([`ShardEndpoints`])

use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::record::DeviceType;

/// Maximum reasonable worker or uploader count
const MAX_THREADS: usize = 256;

pub const DEFAULT_PATTERN: &str = "/data/appsinstalled/*.tsv.gz";
pub const DEFAULT_FRAME_SIZE: usize = 1024;
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;
pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.01;

/// Load gzip-compressed app-install logs into sharded memcached
#[derive(Parser, Debug, Clone)]
#[command(
    name = "memcload",
    version,
    about = "Load gzip-compressed app-install logs into sharded memcached",
    after_help = "EXAMPLES:\n    \
        memcload --pattern '/data/appsinstalled/*.tsv.gz'\n    \
        memcload --dry --loglevel debug --pattern 'sample/*.tsv.gz'\n    \
        memcload --uploaders 4 --frame-size 512 --report run.json"
)]
pub struct CliArgs {
    /// Glob pattern matching input files
    #[arg(long, default_value = DEFAULT_PATTERN, value_name = "GLOB")]
    pub pattern: String,

    /// memcached address for IDFA records
    #[arg(long, default_value = "127.0.0.1:33013", value_name = "HOST:PORT")]
    pub idfa: String,

    /// memcached address for GAID records
    #[arg(long, default_value = "127.0.0.1:33014", value_name = "HOST:PORT")]
    pub gaid: String,

    /// memcached address for ADID records
    #[arg(long, default_value = "127.0.0.1:33015", value_name = "HOST:PORT")]
    pub adid: String,

    /// memcached address for DVID records
    #[arg(long, default_value = "127.0.0.1:33016", value_name = "HOST:PORT")]
    pub dvid: String,

    /// Parse and encode everything, but do not write to memcached or rename files
    #[arg(long)]
    pub dry: bool,

    /// Log file (stderr if not set)
    #[arg(short = 'l', long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub loglevel: String,

    /// Files processed concurrently
    #[arg(short = 'w', long, default_value_t = num_cpus::get(), value_name = "NUM")]
    pub workers: usize,

    /// Records per frame handed from the parser to the uploaders
    #[arg(long, default_value_t = DEFAULT_FRAME_SIZE, value_name = "NUM")]
    pub frame_size: usize,

    /// Frames buffered between parser and uploaders (per file)
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_name = "NUM")]
    pub queue_capacity: usize,

    /// Upload threads per file
    #[arg(long, default_value_t = 1, value_name = "NUM")]
    pub uploaders: usize,

    /// Attempts per memcached write before it counts as an error
    #[arg(long, default_value_t = 3, value_name = "NUM")]
    pub retry_count: u32,

    /// Pause between write attempts
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    pub retry_delay_ms: u64,

    /// Socket connect/read/write timeout
    #[arg(long, default_value_t = 3000, value_name = "MS")]
    pub socket_timeout_ms: u64,

    /// Files with a higher error rate are reported as failed loads
    #[arg(long, default_value_t = DEFAULT_ERROR_THRESHOLD, value_name = "RATE")]
    pub error_threshold: f64,

    /// Do not rename processed files
    #[arg(long)]
    pub no_mark: bool,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Exit with failure when any file exceeds the error threshold
    #[arg(long)]
    pub fail_on_rejected: bool,
}

/// One memcached address per device type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardEndpoints(BTreeMap<DeviceType, String>);

impl ShardEndpoints {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, device_type: DeviceType, addr: impl Into<String>) -> Self {
        self.0.insert(device_type, addr.into());
        self
    }

    pub fn get(&self, device_type: DeviceType) -> Option<&str> {
        self.0.get(&device_type).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceType, &str)> {
        self.0.iter().map(|(t, a)| (*t, a.as_str()))
    }

    /// Every address must look like `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEndpoint`] for the first malformed address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (device_type, addr) in self.iter() {
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(ConfigError::InvalidEndpoint {
                    device_type,
                    addr: addr.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ShardEndpoints {
    fn default() -> Self {
        Self::new()
            .with(DeviceType::Idfa, "127.0.0.1:33013")
            .with(DeviceType::Gaid, "127.0.0.1:33014")
            .with(DeviceType::Adid, "127.0.0.1:33015")
            .with(DeviceType::Dvid, "127.0.0.1:33016")
    }
}

/// Settings for one file's conversion/upload pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Maximum entries per frame
    pub frame_size: usize,
    /// Frames the bounded queue holds before the parser blocks
    pub queue_capacity: usize,
    /// Concurrent upload workers
    pub uploader_count: usize,
    /// Total attempts per store write
    pub retry_count: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// A file is accepted when its error rate is strictly below this
    pub error_threshold: f64,
    /// Skip network writes
    pub dry_run: bool,
    /// Rename files after processing
    pub mark_processed: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            uploader_count: 1,
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            dry_run: false,
            mark_processed: true,
        }
    }
}

impl PipelineConfig {
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_size == 0 {
            return Err(ConfigError::InvalidFrameSize(self.frame_size));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(self.queue_capacity));
        }
        if self.uploader_count == 0 || self.uploader_count > MAX_THREADS {
            return Err(ConfigError::InvalidUploaderCount {
                count: self.uploader_count,
                max: MAX_THREADS,
            });
        }
        if self.retry_count == 0 {
            return Err(ConfigError::InvalidRetryCount(self.retry_count));
        }
        if !(self.error_threshold > 0.0 && self.error_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.error_threshold));
        }
        Ok(())
    }
}

/// Validated configuration for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderConfig {
    pub pattern: String,
    pub endpoints: ShardEndpoints,
    pub workers: usize,
    pub socket_timeout: Duration,
    pub pipeline: PipelineConfig,
    pub report: Option<PathBuf>,
    pub fail_on_rejected: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            endpoints: ShardEndpoints::default(),
            workers: num_cpus::get(),
            socket_timeout: Duration::from_secs(3),
            pipeline: PipelineConfig::default(),
            report: None,
            fail_on_rejected: false,
        }
    }
}

impl LoaderConfig {
    /// Build and validate a configuration from command-line arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any setting is out of range.
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let config = Self {
            pattern: args.pattern,
            endpoints: ShardEndpoints::new()
                .with(DeviceType::Idfa, args.idfa)
                .with(DeviceType::Gaid, args.gaid)
                .with(DeviceType::Adid, args.adid)
                .with(DeviceType::Dvid, args.dvid),
            workers: args.workers,
            socket_timeout: Duration::from_millis(args.socket_timeout_ms),
            pipeline: PipelineConfig {
                frame_size: args.frame_size,
                queue_capacity: args.queue_capacity,
                uploader_count: args.uploaders,
                retry_count: args.retry_count,
                retry_delay: Duration::from_millis(args.retry_delay_ms),
                error_threshold: args.error_threshold,
                dry_run: args.dry,
                mark_processed: !args.no_mark && !args.dry,
            },
            report: args.report,
            fail_on_rejected: args.fail_on_rejected,
        };
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_THREADS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.workers,
                max: MAX_THREADS,
            });
        }
        self.endpoints.validate()?;
        self.pipeline.validate()
    }
}
