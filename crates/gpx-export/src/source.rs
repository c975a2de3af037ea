//! Track source collaborator boundary.
//!
//! The engine reads tracks through [`TrackSource`] and never touches the
//! underlying store itself. Point sequences are supplied ordered ascending by
//! timestamp; [`MemoryTrackSource`] enforces that on insert, other
//! implementations carry the same contract.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::errors::SourceError;
use crate::models::{Track, TrackId, TrackPoint, WayPoint};

/// Read access to recorded tracks.
pub trait TrackSource {
    fn track(&self, id: TrackId) -> Result<Track, SourceError>;

    /// Track points, ascending by timestamp.
    fn track_points(&self, id: TrackId) -> Result<Vec<TrackPoint>, SourceError>;

    /// Waypoints, ascending by timestamp.
    fn way_points(&self, id: TrackId) -> Result<Vec<WayPoint>, SourceError>;
}

/// One track with its point streams, as held by [`MemoryTrackSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track: Track,
    #[serde(default)]
    pub points: Vec<TrackPoint>,
    #[serde(default)]
    pub waypoints: Vec<WayPoint>,
}

/// In-memory [`TrackSource`], JSON-loadable. Backs the export binary and the
/// test suite.
#[derive(Debug, Default)]
pub struct MemoryTrackSource {
    records: Vec<TrackRecord>,
}

impl MemoryTrackSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of [`TrackRecord`]s.
    pub fn from_json(reader: impl Read) -> Result<Self, serde_json::Error> {
        let records: Vec<TrackRecord> = serde_json::from_reader(reader)?;
        let mut source = Self::new();
        for record in records {
            source.push(record);
        }
        Ok(source)
    }

    /// Adds a track, restoring the ascending-timestamp ordering contract.
    pub fn push(&mut self, mut record: TrackRecord) {
        record.points.sort_by_key(|p| p.time_ms);
        record.waypoints.sort_by_key(|w| w.time_ms);
        self.records.push(record);
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.records.iter().map(|r| r.track.id).collect()
    }

    fn record(&self, id: TrackId) -> Result<&TrackRecord, SourceError> {
        self.records
            .iter()
            .find(|r| r.track.id == id)
            .ok_or(SourceError::NoSuchTrack(id))
    }
}

impl TrackSource for MemoryTrackSource {
    fn track(&self, id: TrackId) -> Result<Track, SourceError> {
        self.record(id).map(|r| r.track.clone())
    }

    fn track_points(&self, id: TrackId) -> Result<Vec<TrackPoint>, SourceError> {
        self.record(id).map(|r| r.points.clone())
    }

    fn way_points(&self, id: TrackId) -> Result<Vec<WayPoint>, SourceError> {
        self.record(id).map(|r| r.waypoints.clone())
    }
}
