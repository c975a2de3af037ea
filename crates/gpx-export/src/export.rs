//! Batch export orchestration.
//!
//! Sequences directory resolution, filename building, document writing,
//! optional media copying and export-date bookkeeping for one or more tracks.
//! Tracks are processed strictly in the order given; each runs in isolation
//! and a failure is captured as that track's result instead of raising
//! through to the rest of the batch (subject to [`BatchErrorPolicy`]).
//!
//! Documents are written to a `.gpx.part` temp name and renamed into place on
//! success, so a partially written file is never visible under the final
//! name.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::{BatchErrorPolicy, ExportBehavior, ExportPreferences};
use crate::directory::resolve_export_directory;
use crate::errors::ExportError;
use crate::filename::build_filename;
use crate::models::TrackId;
use crate::source::TrackSource;
use crate::writer::{CancelToken, GpxWriter, ProgressSink};

/// Suffix of the temporary file a document is staged under.
const PART_SUFFIX: &str = ".part";

/// Fixed output name used by the share/upload flow.
pub const SHARE_FILENAME: &str = "share.gpx";

/// Media-library rescan hook, invoked with newly written file paths.
/// Fire-and-forget: the orchestrator never fails an export over it.
pub trait MediaIndexer {
    fn media_scan(&self, paths: &[PathBuf]);
}

/// Records the time a track was last exported.
pub trait ExportDateRecorder {
    fn set_export_date(&self, id: TrackId, exported_at_ms: i64) -> Result<(), crate::errors::SourceError>;
}

/// Pipeline stage a track was in when its result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    Pending,
    ResolvingDirectory,
    Writing,
    CopyingMedia,
    UpdatingExportDate,
    Done,
}

/// Outcome for one track of a batch.
#[derive(Debug)]
pub enum ExportOutcome {
    Done {
        path: PathBuf,
        media_copied: usize,
    },
    Failed {
        phase: ExportPhase,
        message: String,
    },
    /// Not attempted because an earlier failure aborted the batch.
    Skipped,
}

#[derive(Debug)]
pub struct TrackExportResult {
    pub track_id: TrackId,
    pub outcome: ExportOutcome,
}

impl TrackExportResult {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, ExportOutcome::Done { .. })
    }
}

/// Handle to a document produced by the share flow. The caller owns the file
/// and removes it with [`ExportHandle::cleanup`] once the share completes.
#[derive(Debug)]
pub struct ExportHandle {
    path: PathBuf,
}

impl ExportHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cleanup(self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }
}

/// The export pipeline entry point.
pub struct Exporter<'a> {
    source: &'a dyn TrackSource,
    media_indexer: Option<&'a dyn MediaIndexer>,
    export_dates: Option<&'a dyn ExportDateRecorder>,
}

impl<'a> Exporter<'a> {
    pub fn new(source: &'a dyn TrackSource) -> Self {
        Self {
            source,
            media_indexer: None,
            export_dates: None,
        }
    }

    pub fn with_media_indexer(mut self, indexer: &'a dyn MediaIndexer) -> Self {
        self.media_indexer = Some(indexer);
        self
    }

    pub fn with_export_date_recorder(mut self, recorder: &'a dyn ExportDateRecorder) -> Self {
        self.export_dates = Some(recorder);
        self
    }

    /// Exports each track to storage, in the order given.
    pub fn export_tracks(
        &self,
        ids: &[TrackId],
        prefs: &ExportPreferences,
        behavior: &ExportBehavior,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Vec<TrackExportResult> {
        let mut results = Vec::with_capacity(ids.len());
        let mut aborted = false;
        for &id in ids {
            if aborted {
                results.push(TrackExportResult {
                    track_id: id,
                    outcome: ExportOutcome::Skipped,
                });
                continue;
            }
            let outcome = match self.export_one(id, prefs, behavior, None, progress, cancel) {
                Ok((path, media_copied)) => {
                    info!(track = %id, path = %path.display(), "track exported");
                    ExportOutcome::Done { path, media_copied }
                }
                Err((phase, err)) => {
                    warn!(track = %id, ?phase, error = %err, "track export failed");
                    if behavior.on_error == BatchErrorPolicy::AbortBatch {
                        aborted = true;
                    }
                    ExportOutcome::Failed {
                        phase,
                        message: err.to_string(),
                    }
                }
            };
            results.push(TrackExportResult {
                track_id: id,
                outcome,
            });
        }
        results
    }

    /// Share/upload variant: writes the document under a fixed name in
    /// `temp_dir`, with no media copy and no export-date bookkeeping, and
    /// hands the file back to the caller.
    pub fn export_for_share(
        &self,
        id: TrackId,
        prefs: &ExportPreferences,
        temp_dir: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<ExportHandle, ExportError> {
        let writable = fs::metadata(temp_dir)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            return Err(ExportError::StorageUnavailable(temp_dir.to_path_buf()));
        }
        let behavior = ExportBehavior::share();
        self.export_one(id, prefs, &behavior, Some(temp_dir), progress, cancel)
            .map(|(path, _)| ExportHandle { path })
            .map_err(|(_, err)| err)
    }

    fn export_one(
        &self,
        id: TrackId,
        prefs: &ExportPreferences,
        behavior: &ExportBehavior,
        share_dir: Option<&Path>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(PathBuf, usize), (ExportPhase, ExportError)> {
        let mut phase = ExportPhase::ResolvingDirectory;
        let track = self
            .source
            .track(id)
            .map_err(|err| (phase, ExportError::from(err)))?;
        let dir = match share_dir {
            Some(dir) => dir.to_path_buf(),
            None => resolve_export_directory(id, track.start_time_ms, prefs)
                .map_err(|err| (phase, err))?,
        };
        let filename = match share_dir {
            Some(_) => SHARE_FILENAME.to_string(),
            None => {
                build_filename(track.name.as_deref(), track.start_time_ms, prefs.filename_policy)
            }
        };
        let final_path = dir.join(&filename);
        let part_path = dir.join(format!("{filename}{PART_SUFFIX}"));

        phase = ExportPhase::Writing;
        self.write_staged(id, prefs, &part_path, progress, cancel)
            .map_err(|err| {
                // Never leave a partial file behind.
                if let Err(remove_err) = fs::remove_file(&part_path) {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %part_path.display(), error = %remove_err, "could not remove partial file");
                    }
                }
                (phase, err)
            })?;
        fs::rename(&part_path, &final_path)
            .map_err(|err| (phase, ExportError::Write(err)))?;

        let mut written = vec![final_path.clone()];
        let mut media_copied = 0;
        if behavior.copy_media {
            phase = ExportPhase::CopyingMedia;
            media_copied = self
                .copy_media(id, &dir, &mut written)
                .map_err(|err| (phase, err))?;
        }

        if let Some(indexer) = self.media_indexer {
            indexer.media_scan(&written);
        }

        if behavior.update_export_date {
            phase = ExportPhase::UpdatingExportDate;
            if let Some(recorder) = self.export_dates {
                let now_ms = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
                if let Err(err) = recorder.set_export_date(id, now_ms) {
                    warn!(track = %id, error = %err, "could not record export date");
                }
            }
        }

        Ok((final_path, media_copied))
    }

    fn write_staged(
        &self,
        id: TrackId,
        prefs: &ExportPreferences,
        part_path: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), ExportError> {
        let points = self.source.track_points(id)?;
        let waypoints = self.source.way_points(id)?;
        let file = File::create(part_path)?;
        let mut sink = BufWriter::new(file);
        GpxWriter::new(prefs).write_document(&points, &waypoints, &mut sink, progress, cancel)?;
        sink.flush()?;
        Ok(())
    }

    /// Copies waypoint-linked local media files beside the document. Links
    /// that do not resolve to an existing local file (relative references,
    /// remote URLs) are passed through untouched.
    fn copy_media(
        &self,
        id: TrackId,
        dir: &Path,
        written: &mut Vec<PathBuf>,
    ) -> Result<usize, ExportError> {
        let mut copied = 0;
        for waypoint in self.source.way_points(id)? {
            let Some(link) = waypoint.link.as_deref() else {
                continue;
            };
            let source = Path::new(link.strip_prefix("file://").unwrap_or(link));
            if !source.is_absolute() || !source.is_file() {
                continue;
            }
            let Some(name) = source.file_name() else {
                continue;
            };
            let dest = dir.join(name);
            fs::copy(source, &dest).map_err(|err| ExportError::MediaCopy {
                path: source.to_path_buf(),
                source: err,
            })?;
            written.push(dest);
            copied += 1;
        }
        Ok(copied)
    }
}
