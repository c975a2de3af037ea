//! Export directory resolution.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::config::ExportPreferences;
use crate::errors::ExportError;
use crate::filename::timestamp_for_filename;
use crate::models::TrackId;

/// Resolves (and creates) the directory a track's document is written to.
///
/// With `per_track_subdir` set, the track gets its own subdirectory named
/// `YYYY-MM-DD_HH-MM-SS_track<id>`; the id suffix keeps two tracks with the
/// same timestamp-derived name apart. Pre-existing directories are success,
/// so the call is idempotent.
pub fn resolve_export_directory(
    track_id: TrackId,
    start_time_ms: i64,
    prefs: &ExportPreferences,
) -> Result<PathBuf, ExportError> {
    let base = &prefs.base_dir;
    let writable = fs::metadata(base)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false);
    if !writable {
        return Err(ExportError::StorageUnavailable(base.clone()));
    }

    let target = if prefs.per_track_subdir {
        base.join(format!(
            "{}_track{}",
            timestamp_for_filename(start_time_ms),
            track_id
        ))
    } else {
        base.clone()
    };

    fs::create_dir_all(&target).map_err(|source| ExportError::DirectoryCreationFailed {
        path: target.clone(),
        source,
    })?;
    debug!(dir = %target.display(), "resolved export directory");
    Ok(target)
}
