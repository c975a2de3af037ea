//! Typed records for tracks, track points and waypoints.
//!
//! These are the boundary types produced by a [`TrackSource`](crate::source::TrackSource):
//! the export engine never performs string-keyed field lookups itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub i64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Track metadata.
///
/// `name` may be absent, in which case the formatted start timestamp is the
/// effective display name. The start timestamp is immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    #[serde(default)]
    pub name: Option<String>,
    /// Recording start, epoch milliseconds UTC.
    pub start_time_ms: i64,
}

/// A continuously logged position sample.
///
/// Belongs to exactly one track, immutable once written, ordered ascending by
/// timestamp for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPoint {
    /// WGS84 degrees.
    pub lat: f64,
    /// WGS84 degrees.
    pub lon: f64,
    /// Epoch milliseconds UTC.
    pub time_ms: i64,
    /// Meters above the WGS84 ellipsoid.
    #[serde(default)]
    pub elevation: Option<f64>,
    /// Reported horizontal accuracy, meters. Used to approximate hdop.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Meters per second.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Compass heading, degrees.
    #[serde(default)]
    pub heading: Option<f64>,
    /// Compass accuracy, degrees.
    #[serde(default)]
    pub heading_accuracy: Option<f64>,
}

/// A discrete, user- or event-triggered point of interest.
///
/// `uid` is a stable identifier used by asynchronous annotation flows (voice,
/// photo, text notes attached after initial creation) to update or delete the
/// point later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayPoint {
    pub lat: f64,
    pub lon: f64,
    /// Epoch milliseconds UTC.
    pub time_ms: i64,
    /// Required label.
    pub name: String,
    /// Stable unique identifier.
    pub uid: String,
    /// Optional hyperlink, typically a media file attached to the point.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Number of satellites used for the fix.
    #[serde(default)]
    pub satellites: Option<u32>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub heading_accuracy: Option<f64>,
}
