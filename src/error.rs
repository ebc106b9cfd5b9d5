//! Error types for memcload
//!
//! The hierarchy mirrors the failure taxonomy of the loader:
//! - [`ParseError`]: one input line could not become a record (counted, never fatal)
//! - [`StoreError`]: one store operation failed (retried if transient, then counted)
//! - [`ConfigError`]: invalid configuration or a missing shard mapping (fatal)
//! - [`LoadError`]: anything that aborts the pipeline of a single file
//!
//! Per-record failures are recovered into counters by the pipeline; only
//! [`LoadError`] ever propagates out of [`crate::loader::FileLoader::process`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::record::DeviceType;

/// Why a single line was rejected by the parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not enough tab-separated fields
    #[error("malformed line: expected 5 tab-separated fields, got {fields}")]
    MalformedLine { fields: usize },

    /// Line bytes are not valid UTF-8; counted as a malformed line
    #[error("malformed line: not valid UTF-8")]
    NotUtf8,

    /// Device type column is not one of the known types
    #[error("unknown device type '{0}'")]
    UnknownDeviceType(String),

    /// Device id column is empty
    #[error("device id is missing")]
    MissingDeviceId,
}

impl ParseError {
    /// Short label used for per-reason counters and structured log fields
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::MalformedLine { .. } | ParseError::NotUtf8 => "malformed_line",
            ParseError::UnknownDeviceType(_) => "unknown_device_type",
            ParseError::MissingDeviceId => "missing_device_id",
        }
    }
}

/// Failures talking to a single store endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Socket operation exceeded the configured timeout
    #[error("timed out talking to {addr}")]
    Timeout { addr: String },

    /// Could not connect, or the connection was dropped mid-request
    #[error("connection to {addr} failed: {reason}")]
    Connection { addr: String, reason: String },

    /// Any other socket-level I/O failure
    #[error("I/O error talking to {addr}: {reason}")]
    Io { addr: String, reason: String },

    /// Server reported a transient failure (`SERVER_ERROR ...`)
    #[error("server error from {addr}: {message}")]
    Server { addr: String, message: String },

    /// Server refused the request (`ERROR`, `CLIENT_ERROR ...`, `NOT_STORED`)
    #[error("request rejected by {addr}: {message}")]
    Rejected { addr: String, message: String },

    /// Reply did not follow the protocol
    #[error("unexpected reply from {addr}: {reply}")]
    Protocol { addr: String, reply: String },

    /// Key cannot be sent over the wire
    #[error("invalid store key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
}

impl StoreError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout { .. }
                | StoreError::Connection { .. }
                | StoreError::Io { .. }
                | StoreError::Server { .. }
        )
    }

    /// Map a socket error onto the store taxonomy
    pub(crate) fn from_io(addr: &str, err: &io::Error) -> Self {
        use io::ErrorKind::*;
        match err.kind() {
            TimedOut | WouldBlock => StoreError::Timeout {
                addr: addr.to_string(),
            },
            ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected
            | BrokenPipe | UnexpectedEof | AddrNotAvailable => StoreError::Connection {
                addr: addr.to_string(),
                reason: err.to_string(),
            },
            _ => StoreError::Io {
                addr: addr.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Configuration errors; fatal for the run or the file they are detected in
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Traffic contains a device type with no configured endpoint
    #[error("no store endpoint configured for device type '{0}'")]
    MissingShard(DeviceType),

    /// Endpoint is not in `host:port` form
    #[error("invalid endpoint '{addr}' for '{device_type}': expected host:port")]
    InvalidEndpoint { device_type: DeviceType, addr: String },

    #[error("invalid frame size {0}: must be at least 1")]
    InvalidFrameSize(usize),

    #[error("invalid queue capacity {0}: must be at least 1")]
    InvalidQueueCapacity(usize),

    #[error("invalid uploader count {count}: must be between 1 and {max}")]
    InvalidUploaderCount { count: usize, max: usize },

    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    #[error("invalid retry count {0}: at least one attempt is required")]
    InvalidRetryCount(u32),

    #[error("invalid error threshold {0}: must be within (0, 1]")]
    InvalidThreshold(f64),
}

/// Errors that abort the pipeline of a single file
#[derive(Error, Debug)]
pub enum LoadError {
    /// Input file could not be opened or its decompressor set up
    #[error("cannot open '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    /// Reading the (decompressed) input failed mid-stream
    #[error("read failed in '{path}' after {lines} lines: {source}")]
    Read {
        path: PathBuf,
        lines: u64,
        #[source]
        source: io::Error,
    },

    /// Configuration problem surfaced while processing
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Completion marker rename failed
    #[error("cannot mark '{path}' as processed: {source}")]
    Mark {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An upload worker thread panicked
    #[error("upload worker {id} panicked")]
    WorkerPanicked { id: usize },
}

/// Payload could not be decoded back into a message
#[derive(Error, Debug)]
#[error("cannot decode payload: {0}")]
pub struct CodecError(#[from] pub prost::DecodeError);
