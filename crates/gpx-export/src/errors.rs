//! Error taxonomy for the export pipeline.
//!
//! Every variant is recoverable at the orchestrator level: it is converted
//! into a per-track failure message and reported to the caller.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::TrackId;

/// Failures surfaced by the track source collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no track with id {0}")]
    NoSuchTrack(TrackId),

    #[error("track store error: {0}")]
    Backend(String),
}

/// Failures surfaced by the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("storage volume {0} is not writable")]
    StorageUnavailable(PathBuf),

    #[error("could not create export directory {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error writing GPX document: {0}")]
    Write(#[from] std::io::Error),

    #[error("no track with id {0}")]
    NoSuchTrack(TrackId),

    #[error("track store error: {0}")]
    Source(String),

    #[error("could not copy media file {path}")]
    MediaCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export cancelled")]
    Cancelled,
}

impl From<SourceError> for ExportError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NoSuchTrack(id) => ExportError::NoSuchTrack(id),
            SourceError::Backend(msg) => ExportError::Source(msg),
        }
    }
}
