//! Memcached client speaking the text protocol.
//!
//! Only the two commands the loader needs are implemented:
//!
//! ```text
//! set <key> 0 0 <bytes>\r\n<data>\r\n   ->  STORED | NOT_STORED | ERROR | CLIENT_ERROR .. | SERVER_ERROR ..
//! get <key>\r\n                         ->  [VALUE <key> <flags> <bytes>\r\n<data>\r\n] END
//! ```
//!
//! Connections are opened lazily and kept in a small idle pool so that
//! several upload workers can write to the same shard at once. A connection
//! that saw any error is dropped instead of being returned to the pool.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{KvStore, StoreResult};
use crate::error::StoreError;

/// Socket timeout used when none is configured
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(3);

/// Longest key memcached accepts
pub const MAX_KEY_LEN: usize = 250;

/// Idle connections kept per endpoint
const MAX_IDLE: usize = 8;

/// One memcached endpoint.
pub struct MemcacheStore {
    addr: String,
    timeout: Duration,
    idle: Mutex<Vec<Connection>>,
}

impl MemcacheStore {
    /// Create a store for `addr` (`host:port`) with the default socket timeout.
    /// No connection is made until the first request.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_timeout(addr, DEFAULT_SOCKET_TIMEOUT)
    }

    pub fn with_timeout(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            idle: Mutex::new(Vec::with_capacity(MAX_IDLE)),
        }
    }

    /// Number of idle pooled connections
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    fn checkout(&self) -> StoreResult<Connection> {
        if let Ok(mut idle) = self.idle.lock()
            && let Some(conn) = idle.pop()
        {
            return Ok(conn);
        }
        debug!(addr = %self.addr, "opening memcached connection");
        Connection::open(&self.addr, self.timeout).map_err(|e| StoreError::from_io(&self.addr, &e))
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock()
            && idle.len() < MAX_IDLE
        {
            idle.push(conn);
        }
    }

    fn reply_error(&self, line: &str) -> StoreError {
        if let Some(message) = line.strip_prefix("SERVER_ERROR") {
            StoreError::Server {
                addr: self.addr.clone(),
                message: message.trim().to_string(),
            }
        } else if line == "ERROR" || line == "NOT_STORED" || line.starts_with("CLIENT_ERROR") {
            StoreError::Rejected {
                addr: self.addr.clone(),
                message: line.to_string(),
            }
        } else {
            StoreError::Protocol {
                addr: self.addr.clone(),
                reply: line.to_string(),
            }
        }
    }

    fn do_set(&self, conn: &mut Connection, key: &str, value: &[u8]) -> StoreResult<()> {
        let io_err = |e: io::Error| StoreError::from_io(&self.addr, &e);
        conn.send(&[
            format!("set {key} 0 0 {}\r\n", value.len()).as_bytes(),
            value,
            b"\r\n",
        ])
        .map_err(io_err)?;

        let reply = conn.read_line().map_err(io_err)?;
        if reply == "STORED" {
            Ok(())
        } else {
            Err(self.reply_error(&reply))
        }
    }

    fn do_get(&self, conn: &mut Connection, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let io_err = |e: io::Error| StoreError::from_io(&self.addr, &e);
        conn.send(&[format!("get {key}\r\n").as_bytes()])
            .map_err(io_err)?;

        let header = conn.read_line().map_err(io_err)?;
        if header == "END" {
            return Ok(None);
        }

        let len = parse_value_header(&header, key).ok_or_else(|| self.reply_error(&header))?;
        let mut data = vec![0u8; len + 2];
        conn.reader.read_exact(&mut data).map_err(io_err)?;
        if !data.ends_with(b"\r\n") {
            return Err(StoreError::Protocol {
                addr: self.addr.clone(),
                reply: "value block not terminated by CRLF".into(),
            });
        }
        data.truncate(len);

        let end = conn.read_line().map_err(io_err)?;
        if end != "END" {
            return Err(self.reply_error(&end));
        }
        Ok(Some(data))
    }
}

impl KvStore for MemcacheStore {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        let mut conn = self.checkout()?;
        self.do_set(&mut conn, key, value)?;
        self.checkin(conn);
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let mut conn = self.checkout()?;
        let value = self.do_get(&mut conn, key)?;
        self.checkin(conn);
        Ok(value)
    }
}

/// Check that `key` can be sent in a text-protocol command line.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] for empty, oversized, or whitespace/control-bearing keys.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let reason = if key.is_empty() {
        "empty"
    } else if key.len() > MAX_KEY_LEN {
        "longer than 250 bytes"
    } else if key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        "contains whitespace or control characters"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

/// `VALUE <key> <flags> <bytes>` -> `bytes`
fn parse_value_header(header: &str, key: &str) -> Option<usize> {
    let mut parts = header.split(' ');
    if parts.next()? != "VALUE" || parts.next()? != key {
        return None;
    }
    parts.next()?.parse::<u32>().ok()?;
    parts.next()?.parse().ok()
}

struct Connection {
    reader: BufReader<TcpStream>,
}

impl Connection {
    fn open(addr: &str, timeout: Duration) -> io::Result<Self> {
        let mut last_err = None;
        for sock in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&sock, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(Self {
                        reader: BufReader::new(stream),
                    });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        }))
    }

    fn send(&mut self, chunks: &[&[u8]]) -> io::Result<()> {
        let stream = self.reader.get_mut();
        for chunk in chunks {
            stream.write_all(chunk)?;
        }
        stream.flush()
    }

    /// Reply line without its CRLF
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            ));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(line)
    }
}
