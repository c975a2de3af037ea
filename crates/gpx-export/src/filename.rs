//! Output filename derivation.

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::config::FilenamePolicy;

/// Fixed extension appended to every export filename.
pub const GPX_EXTENSION: &str = ".gpx";

/// Filename-safe timestamp form, UTC.
const FILENAME_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");

/// Characters replaced with `_` in track names. `:` is special-cased to `;`.
const BLACKLIST: &[char] = &[' ', '\'', '"', '/', '\\', '*', '?', '~', '@', '<', '>'];

/// Derives the output filename for a track.
///
/// A name that is empty or whitespace-only counts as absent and falls back to
/// the date form, even under [`FilenamePolicy::NameOnly`].
pub fn build_filename(name: Option<&str>, start_time_ms: i64, policy: FilenamePolicy) -> String {
    let name = name.map(str::trim).filter(|n| !n.is_empty());
    let base = match (policy, name) {
        (FilenamePolicy::NameOnly, Some(name)) => sanitize(name),
        (FilenamePolicy::NameThenDate, Some(name)) => {
            format!("{}_{}", sanitize(name), timestamp_for_filename(start_time_ms))
        }
        (FilenamePolicy::DateThenName, Some(name)) => {
            format!("{}_{}", timestamp_for_filename(start_time_ms), sanitize(name))
        }
        // DateOnly, or any policy with the name absent.
        _ => timestamp_for_filename(start_time_ms),
    };
    format!("{base}{GPX_EXTENSION}")
}

/// Replaces characters that are unsafe on common filesystems.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == ':' {
                ';'
            } else if BLACKLIST.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// `YYYY-MM-DD_HH-MM-SS` (UTC) for epoch milliseconds.
pub(crate) fn timestamp_for_filename(time_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(time_ms) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(FILENAME_TIME)
        .unwrap_or_default()
}
