//! Command-line export runner.
//!
//! Run with:
//! ```
//! cargo run -p gpx-export --bin export -- tracks.json prefs.json
//! ```
//!
//! `tracks.json` is an array of track records (metadata, points, waypoints);
//! `prefs.json` holds the export preferences, `base_dir` at minimum.

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, bail};
use gpx_export::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(tracks_path), Some(prefs_path)) = (args.next(), args.next()) else {
        bail!("usage: export <tracks.json> <prefs.json>");
    };

    let tracks_file = File::open(&tracks_path)
        .with_context(|| format!("could not open track dump {tracks_path}"))?;
    let source = MemoryTrackSource::from_json(BufReader::new(tracks_file))
        .with_context(|| format!("could not parse track dump {tracks_path}"))?;

    let prefs_file = File::open(&prefs_path)
        .with_context(|| format!("could not open preferences {prefs_path}"))?;
    let prefs: ExportPreferences = serde_json::from_reader(BufReader::new(prefs_file))
        .with_context(|| format!("could not parse preferences {prefs_path}"))?;

    let ids = source.track_ids();
    tracing::info!(tracks = ids.len(), base_dir = %prefs.base_dir.display(), "starting export");

    let exporter = Exporter::new(&source);
    let results = exporter.export_tracks(
        &ids,
        &prefs,
        &ExportBehavior::storage(),
        &NoProgress,
        &CancelToken::new(),
    );

    let mut failures = 0;
    for result in &results {
        match &result.outcome {
            ExportOutcome::Done { path, media_copied } => {
                tracing::info!(track = %result.track_id, path = %path.display(), media_copied, "exported");
            }
            ExportOutcome::Failed { phase, message } => {
                failures += 1;
                tracing::error!(track = %result.track_id, ?phase, "{message}");
            }
            ExportOutcome::Skipped => {
                tracing::warn!(track = %result.track_id, "skipped");
            }
        }
    }

    tracing::info!(
        exported = results.iter().filter(|r| r.is_done()).count(),
        failed = failures,
        "export finished"
    );
    if failures > 0 {
        bail!("{failures} track(s) failed to export");
    }
    Ok(())
}
