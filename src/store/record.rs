//! Request records

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo::{self, GeoFinding};

/// One request received by a bin
///
/// Serialized as:
///
/// ```text
/// {"timestamp": 1700000000, "headers": {...}, "body": "...",
///  "geo": [{"geo": {...}, "radius": 8, "path": ["device"]}]}
/// ```
///
/// `geo` is omitted when nothing was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Unix seconds at which the request was received
    pub timestamp: i64,
    /// Request headers, multi-valued headers joined with ", "
    pub headers: BTreeMap<String, String>,
    /// Raw request body
    pub body: String,
    /// Geo data found in the body
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geo: Vec<GeoFinding>,
}

impl RequestRecord {
    /// Create a record from its parts
    pub fn new(
        timestamp: i64,
        headers: BTreeMap<String, String>,
        body: impl Into<String>,
        geo: Vec<GeoFinding>,
    ) -> Self {
        Self {
            timestamp,
            headers,
            body: body.into(),
            geo,
        }
    }

    /// Build a record for a request received now, extracting its geo data
    ///
    /// A body that is not JSON yields a record without findings.
    pub async fn capture(headers: BTreeMap<String, String>, body: &[u8]) -> Self {
        let geo = geo::extract(body).await;
        Self::new(
            unix_now(),
            headers,
            String::from_utf8_lossy(body).into_owned(),
            geo,
        )
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Current time in unix seconds
pub fn unix_now() -> i64 {
    to_unix(SystemTime::now())
}

/// Convert a system time to unix seconds, clamping times before the epoch to 0
pub(crate) fn to_unix(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
