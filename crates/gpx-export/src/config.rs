//! Export configuration.
//!
//! [`ExportPreferences`] is read once per export run from the caller's
//! preference store; the engine never persists preferences itself.
//! [`ExportBehavior`] selects between the storage and share/upload variants
//! of an export run, replacing what would otherwise be a hierarchy of
//! exporter types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the output filename is derived from the track name and start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenamePolicy {
    /// Sanitized track name only; falls back to the date when absent.
    NameOnly,
    /// Formatted start timestamp only.
    DateOnly,
    /// `<name>_<date>`.
    #[default]
    NameThenDate,
    /// `<date>_<name>`.
    DateThenName,
}

/// Where a waypoint's reported accuracy ends up in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyOutput {
    /// Accuracy is not written.
    #[default]
    None,
    /// Accuracy is appended to the waypoint `<name>`.
    WptName,
    /// Accuracy goes into a separate waypoint `<cmt>`.
    WptComment,
}

impl AccuracyOutput {
    /// Maps a stored preference key to a policy. Unrecognized values fall
    /// back to [`AccuracyOutput::None`].
    pub fn from_key(key: &str) -> Self {
        match key {
            "wpt_name" => Self::WptName,
            "wpt_cmt" => Self::WptComment,
            _ => Self::None,
        }
    }
}

/// Where compass heading readings end up in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompassOutput {
    /// Compass data is not written.
    #[default]
    None,
    /// Heading and accuracy are folded into `<cmt>` tags.
    Comment,
    /// Heading and accuracy become `<compass>`/`<compass_accuracy>`
    /// elements inside `<extensions>`.
    Extension,
}

/// User-facing export settings, read once per export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPreferences {
    #[serde(default)]
    pub filename_policy: FilenamePolicy,
    #[serde(default)]
    pub accuracy_output: AccuracyOutput,
    /// Approximate hdop from the reported accuracy.
    #[serde(default)]
    pub fill_hdop: bool,
    #[serde(default)]
    pub compass_output: CompassOutput,
    /// Root of the export storage volume.
    pub base_dir: PathBuf,
    /// Give each track its own subdirectory under `base_dir`.
    #[serde(default)]
    pub per_track_subdir: bool,
    /// Localized meter unit suffix used in accuracy text.
    #[serde(default = "default_meter_unit")]
    pub meter_unit: String,
    /// Localized fixed `<trk><name>` label.
    #[serde(default = "default_track_label")]
    pub track_label: String,
}

fn default_meter_unit() -> String {
    "m".to_string()
}

fn default_track_label() -> String {
    "Track".to_string()
}

impl ExportPreferences {
    /// Preferences with defaults rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            filename_policy: FilenamePolicy::default(),
            accuracy_output: AccuracyOutput::default(),
            fill_hdop: false,
            compass_output: CompassOutput::default(),
            base_dir: base_dir.into(),
            per_track_subdir: false,
            meter_unit: default_meter_unit(),
            track_label: default_track_label(),
        }
    }
}

/// Whether a failed track aborts the rest of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchErrorPolicy {
    /// Record the failure and keep exporting the remaining tracks.
    #[default]
    ContinueRemaining,
    /// Stop the batch; remaining tracks are reported as skipped.
    AbortBatch,
}

/// Variant selection for one export run.
#[derive(Debug, Clone)]
pub struct ExportBehavior {
    /// Copy waypoint-linked media files beside the document.
    pub copy_media: bool,
    /// Record the export timestamp with the track store afterwards.
    pub update_export_date: bool,
    pub on_error: BatchErrorPolicy,
}

impl ExportBehavior {
    /// The regular export-to-storage flow.
    pub fn storage() -> Self {
        Self {
            copy_media: true,
            update_export_date: true,
            on_error: BatchErrorPolicy::ContinueRemaining,
        }
    }

    /// The share/upload flow: document only, no bookkeeping.
    pub fn share() -> Self {
        Self {
            copy_media: false,
            update_export_date: false,
            on_error: BatchErrorPolicy::AbortBatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_accuracy_key_falls_back_to_none() {
        assert_eq!(AccuracyOutput::from_key("wpt_name"), AccuracyOutput::WptName);
        assert_eq!(AccuracyOutput::from_key("wpt_cmt"), AccuracyOutput::WptComment);
        assert_eq!(AccuracyOutput::from_key("banana"), AccuracyOutput::None);
        assert_eq!(AccuracyOutput::from_key(""), AccuracyOutput::None);
    }

    #[test]
    fn preferences_deserialize_with_defaults() {
        let prefs: ExportPreferences =
            serde_json::from_str(r#"{"base_dir": "/tmp/out"}"#).unwrap();
        assert_eq!(prefs.filename_policy, FilenamePolicy::NameThenDate);
        assert_eq!(prefs.meter_unit, "m");
        assert_eq!(prefs.track_label, "Track");
        assert!(!prefs.fill_hdop);
        assert!(!prefs.per_track_subdir);
    }
}
