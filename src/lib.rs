//! # memcload
//!
//! A **bulk loader** for app-install logs. Each input file is a gzip-compressed
//! TSV where every line describes one device and the apps installed on it.
//! memcload parses the lines, encodes each record as a compact protobuf message
//! and writes it to one of several memcached shards, chosen by device type.
//!
//! ## Key Features
//!
//! - **Streaming** - files are read line by line, never loaded whole
//! - **Pipelined** - parsing and network writes overlap through a bounded queue
//! - **Sharded** - one memcached endpoint per device type (`idfa`, `gaid`, `adid`, `dvid`)
//! - **Resilient** - bad lines and failed writes are counted, not fatal
//! - **Resumable** - finished files are renamed with a leading `.` and skipped next time
//! - **Transparent compression** - gzip by default; zstd, bzip2 and xz via feature flags
//!
//! ## Quick Start
//!
//! ```no_run
//! use memcload::config::LoaderConfig;
//! use memcload::driver::{Driver, discover};
//! use memcload::loader::FileLoader;
//! use memcload::router::ShardRouter;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = LoaderConfig::default();
//! let router = ShardRouter::memcached(&config.endpoints, &config.pipeline, config.socket_timeout);
//! let loader = FileLoader::new(config.pipeline.clone(), Arc::new(router))?;
//!
//! let files = discover(&config.pattern)?;
//! let report = Driver::new(loader, config.workers).run(&files)?;
//! println!("{} files accepted", report.totals.accepted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! driver ── rayon pool ──► loader (one per file)
//!                            │
//!                            ├─ record::parse_line ─► codec::encode ─► FrameBuilder
//!                            │                                            │
//!                            │                                  bounded queue of frames
//!                            │                                            │
//!                            └─ upload workers ◄──────────────────────────┘
//!                                     │
//!                                     └─ ShardRouter ─► StoreClient ─► memcached
//! ```
//!
//! A file is **accepted** when its error rate (`errors / (ok + errors)`) is
//! strictly below the configured threshold. A file with nothing to count has
//! an error rate of 1 and is always rejected.

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod io;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod router;
pub mod stats;
pub mod store;
pub mod testing;

pub use codec::UserApps;
pub use config::{LoaderConfig, PipelineConfig, ShardEndpoints};
pub use driver::{Driver, FileReport, RunReport, discover};
pub use error::{CodecError, ConfigError, LoadError, ParseError, StoreError};
pub use loader::FileLoader;
pub use record::{AppsInstalled, DeviceType, Parsed, RoutingKey, parse_line};
pub use router::ShardRouter;
pub use stats::{FileCounters, FileOutcome};
pub use store::{KvStore, MemcacheStore, MemoryStore, RetryPolicy, StoreClient, WriteOutcome};
