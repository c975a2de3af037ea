//! GPX 1.1 track export engine.
//!
//! Turns recorded GPS tracks (track points plus annotated waypoints) into
//! well-formed GPX 1.1 documents on disk: filename derivation from a naming
//! policy, export directory resolution, deterministic document writing with
//! progress reporting and cooperative cancellation, and batch orchestration
//! with per-track error isolation.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gpx_export::prelude::*;
//!
//! let source = MemoryTrackSource::from_json(file)?;
//! let prefs = ExportPreferences::with_base_dir("/storage/gpx");
//! let results = Exporter::new(&source).export_tracks(
//!     &source.track_ids(),
//!     &prefs,
//!     &ExportBehavior::storage(),
//!     &NoProgress,
//!     &CancelToken::new(),
//! );
//! ```

pub mod config;
pub mod directory;
pub mod errors;
pub mod export;
pub mod filename;
pub mod models;
pub mod source;
pub mod writer;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{
        AccuracyOutput, BatchErrorPolicy, CompassOutput, ExportBehavior, ExportPreferences,
        FilenamePolicy,
    };
    pub use crate::errors::{ExportError, SourceError};
    pub use crate::export::{
        ExportDateRecorder, ExportHandle, ExportOutcome, ExportPhase, Exporter, MediaIndexer,
        TrackExportResult,
    };
    pub use crate::filename::build_filename;
    pub use crate::models::{Track, TrackId, TrackPoint, WayPoint};
    pub use crate::source::{MemoryTrackSource, TrackRecord, TrackSource};
    pub use crate::writer::{CancelToken, GpxWriter, NoProgress, ProgressSink};
}
