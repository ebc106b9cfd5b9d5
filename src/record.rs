//! Parsing of raw app-install log lines.
//!
//! Each line has five tab-separated columns:
//!
//! ```text
//! device_type<TAB>device_id<TAB>lat<TAB>lon<TAB>app_id[,app_id...]
//! ```
//!
//! [`parse_line`] turns a line into an [`AppsInstalled`] record, a
//! [`Parsed::Skip`] for blank lines, or a [`ParseError`]. Degraded fields
//! (non-numeric app ids, unparsable coordinates) do not fail the line: the
//! record is kept with the bad parts dropped or set to NaN and a data-quality
//! warning is logged.
//!
//! ```
//! use memcload::record::{parse_line, DeviceType, Parsed};
//!
//! let Parsed::Record(rec) = parse_line("idfa\t1\t0\t0\t1423,   ").unwrap() else {
//!     panic!("expected a record");
//! };
//! assert_eq!(rec.device_type, DeviceType::Idfa);
//! assert_eq!(rec.apps, vec![1423]);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::ParseError;

/// Number of columns in a well-formed line
pub const FIELD_COUNT: usize = 5;

/// Known device identifier families; each one is served by its own shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Idfa,
    Gaid,
    Adid,
    Dvid,
}

impl DeviceType {
    pub const ALL: [DeviceType; 4] = [
        DeviceType::Idfa,
        DeviceType::Gaid,
        DeviceType::Adid,
        DeviceType::Dvid,
    ];

    /// Lowercase name used in store keys and configuration
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::Idfa => "idfa",
            DeviceType::Gaid => "gaid",
            DeviceType::Adid => "adid",
            DeviceType::Dvid => "dvid",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = ParseError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        DeviceType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseError::UnknownDeviceType(trimmed.to_string()))
    }
}

/// One parsed log line.
#[derive(Clone, Debug, PartialEq)]
pub struct AppsInstalled {
    pub device_type: DeviceType,
    pub device_id: String,
    pub lat: f64,
    pub lon: f64,
    pub apps: Vec<i32>,
}

impl AppsInstalled {
    /// Destination of this record: shard by type, key by type and id
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey {
            device_type: self.device_type,
            device_id: self.device_id.clone(),
        }
    }
}

/// Identifies both the shard (via `device_type`) and the key within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    pub device_type: DeviceType,
    pub device_id: String,
}

impl RoutingKey {
    /// Store key, e.g. `idfa:1rfw452y52g2gq4g`
    pub fn store_key(&self) -> String {
        format!("{}:{}", self.device_type, self.device_id)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device_type, self.device_id)
    }
}

/// Result of parsing a line that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed {
    Record(AppsInstalled),
    /// Blank line; neither an error nor a record
    Skip,
}

/// Parse one raw line.
///
/// # Errors
///
/// - [`ParseError::MalformedLine`] unless exactly five columns are present
/// - [`ParseError::UnknownDeviceType`] when the first column is not a known type
/// - [`ParseError::MissingDeviceId`] when the second column is empty
pub fn parse_line(line: &str) -> Result<Parsed, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Parsed::Skip);
    }

    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() != FIELD_COUNT {
        return Err(ParseError::MalformedLine { fields: parts.len() });
    }

    let device_type: DeviceType = parts[0].parse()?;

    let device_id = parts[1];
    if device_id.is_empty() {
        return Err(ParseError::MissingDeviceId);
    }

    let (lat, lon) = match (parts[2].trim().parse::<f64>(), parts[3].trim().parse::<f64>()) {
        (Ok(lat), Ok(lon)) => (lat, lon),
        _ => {
            warn!(line, "invalid geo coordinates, using NaN");
            (f64::NAN, f64::NAN)
        }
    };

    let apps = parse_apps(parts[4], line);

    Ok(Parsed::Record(AppsInstalled {
        device_type,
        device_id: device_id.to_string(),
        lat,
        lon,
        apps,
    }))
}

/// Comma-separated app ids; empty tokens are ignored, bad ones dropped with a warning.
fn parse_apps(raw: &str, line: &str) -> Vec<i32> {
    let mut apps = Vec::new();
    let mut dropped = 0usize;
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<i32>() {
            Ok(app) => apps.push(app),
            Err(_) => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(line, dropped, "not all user apps are numeric");
    }
    apps
}
