//! Binary payload stored for each device.
//!
//! The payload is a protobuf message compatible with the `appsinstalled.proto`
//! schema used by the other readers of the store:
//!
//! ```text
//! message UserApps {
//!     repeated int32 apps = 1;
//!     optional double lat = 2;
//!     optional double lon = 3;
//! }
//! ```
//!
//! `apps` is written unpacked, as proto2 readers expect; prost accepts both
//! encodings when decoding.

use prost::Message;

use crate::error::CodecError;
use crate::record::AppsInstalled;

#[derive(Clone, PartialEq, Message)]
pub struct UserApps {
    #[prost(int32, repeated, packed = "false", tag = "1")]
    pub apps: Vec<i32>,
    #[prost(double, optional, tag = "2")]
    pub lat: Option<f64>,
    #[prost(double, optional, tag = "3")]
    pub lon: Option<f64>,
}

impl UserApps {
    /// Latitude, NaN when absent. The derived `lat()` falls back to 0.0.
    pub fn lat_or_nan(&self) -> f64 {
        self.lat.unwrap_or(f64::NAN)
    }

    /// Longitude, NaN when absent
    pub fn lon_or_nan(&self) -> f64 {
        self.lon.unwrap_or(f64::NAN)
    }

    /// Field-wise comparison that treats NaN coordinates as equal.
    pub fn same_as(&self, record: &AppsInstalled) -> bool {
        fn same(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
        }
        same(self.lat_or_nan(), record.lat) && same(self.lon_or_nan(), record.lon) && self.apps == record.apps
    }
}

impl From<&AppsInstalled> for UserApps {
    fn from(record: &AppsInstalled) -> Self {
        Self {
            apps: record.apps.clone(),
            lat: Some(record.lat),
            lon: Some(record.lon),
        }
    }
}

/// Serialize a record into its store payload.
pub fn encode(record: &AppsInstalled) -> Vec<u8> {
    UserApps::from(record).encode_to_vec()
}

/// Decode a payload previously produced by [`encode`].
///
/// # Errors
///
/// Returns [`CodecError`] if the bytes are not a valid `UserApps` message.
pub fn decode(payload: &[u8]) -> Result<UserApps, CodecError> {
    Ok(UserApps::decode(payload)?)
}
