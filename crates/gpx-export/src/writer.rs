//! GPX 1.1 document writer.
//!
//! Serializes one track into a single well-formed GPX 1.1 document on any
//! [`io::Write`] sink. Output is fully deterministic: identical inputs and
//! preferences produce byte-identical documents, which golden-file tests rely
//! on. Free-text content is CDATA-wrapped so arbitrary user input needs no
//! entity escaping.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::debug;

use crate::config::{AccuracyOutput, CompassOutput, ExportPreferences};
use crate::errors::ExportError;
use crate::models::{TrackPoint, WayPoint};

/// Divisor approximating hdop from the reported accuracy in meters.
pub const HDOP_FACTOR: f64 = 4.0;

/// Creator attribute of the `<gpx>` root element.
pub const CREATOR: &str = concat!("gpx-export/", env!("CARGO_PKG_VERSION"));

const HDOP_NOTE: &str = "hdop values are approximated from the reported accuracy (accuracy / 4)";

/// `<time>` element form, UTC.
const GPX_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Receives advisory progress notifications from the writer.
///
/// Calls are made after the corresponding output has been produced; dropping
/// every notification never affects the document.
pub trait ProgressSink {
    /// Total counts, reported once before any point is written.
    fn started(&self, track_points: u64, way_points: u64) {
        let _ = (track_points, way_points);
    }

    /// Cumulative number of points written so far. Reported roughly every 1%
    /// of the combined point count, with a minimum granularity of one point.
    fn advanced(&self, points_done: u64) {
        let _ = points_done;
    }
}

/// [`ProgressSink`] that discards every notification.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Cooperative cancellation flag, checked between points (never mid-point).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Writes GPX 1.1 documents under a fixed set of export preferences.
pub struct GpxWriter<'a> {
    prefs: &'a ExportPreferences,
}

impl<'a> GpxWriter<'a> {
    pub fn new(prefs: &'a ExportPreferences) -> Self {
        Self { prefs }
    }

    /// Serializes the full document: one `<trk>` with one `<trkseg>` of track
    /// points, then one `<wpt>` per waypoint, both ascending by timestamp as
    /// supplied.
    ///
    /// Partial output is possible on failure or cancellation; the caller must
    /// not publish a half-written file as success.
    pub fn write_document<W: Write>(
        &self,
        points: &[TrackPoint],
        waypoints: &[WayPoint],
        sink: &mut W,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), ExportError> {
        let total = (points.len() + waypoints.len()) as u64;
        let step = (total / 100).max(1);
        progress.started(points.len() as u64, waypoints.len() as u64);

        writeln!(sink, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            sink,
            r#"<gpx version="1.1" creator="{CREATOR}" xmlns="http://www.topografix.com/GPX/1/1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">"#
        )?;

        writeln!(sink, "  <trk>")?;
        writeln!(sink, "    <name>{}</name>", cdata(&self.prefs.track_label))?;
        if self.prefs.fill_hdop {
            writeln!(sink, "    <cmt>{}</cmt>", cdata(HDOP_NOTE))?;
        }
        writeln!(sink, "    <trkseg>")?;

        let mut done: u64 = 0;
        for point in points {
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            self.write_track_point(point, sink)?;
            done += 1;
            if done % step == 0 {
                progress.advanced(done);
            }
        }

        writeln!(sink, "    </trkseg>")?;
        writeln!(sink, "  </trk>")?;

        for waypoint in waypoints {
            if cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            self.write_way_point(waypoint, sink)?;
            done += 1;
            if done % step == 0 {
                progress.advanced(done);
            }
        }

        writeln!(sink, "</gpx>")?;
        if done % step != 0 {
            progress.advanced(done);
        }
        debug!(track_points = points.len(), way_points = waypoints.len(), "document written");
        Ok(())
    }

    fn write_track_point<W: Write>(&self, point: &TrackPoint, sink: &mut W) -> io::Result<()> {
        writeln!(
            sink,
            r#"      <trkpt lat="{}" lon="{}">"#,
            fmt_decimal(point.lat),
            fmt_decimal(point.lon)
        )?;
        if let Some(ele) = point.elevation {
            writeln!(sink, "        <ele>{}</ele>", fmt_decimal(ele))?;
        }
        writeln!(sink, "        <time>{}</time>", gpx_time(point.time_ms))?;
        if self.prefs.fill_hdop {
            if let Some(accuracy) = point.accuracy {
                writeln!(sink, "        <hdop>{}</hdop>", fmt_decimal(accuracy / HDOP_FACTOR))?;
            }
        }
        if self.prefs.compass_output == CompassOutput::Comment {
            if let Some(heading) = point.heading {
                let text = compass_text(heading, point.heading_accuracy);
                writeln!(sink, "        <cmt>{}</cmt>", cdata(&text))?;
            }
        }

        let speed = point.speed;
        let compass = match self.prefs.compass_output {
            CompassOutput::Extension => point.heading,
            _ => None,
        };
        if speed.is_some() || compass.is_some() {
            writeln!(sink, "        <extensions>")?;
            if let Some(speed) = speed {
                writeln!(sink, "          <speed>{}</speed>", fmt_decimal(speed))?;
            }
            if let Some(heading) = compass {
                writeln!(sink, "          <compass>{}</compass>", fmt_decimal(heading))?;
                if let Some(acc) = point.heading_accuracy {
                    writeln!(
                        sink,
                        "          <compass_accuracy>{}</compass_accuracy>",
                        fmt_decimal(acc)
                    )?;
                }
            }
            writeln!(sink, "        </extensions>")?;
        }
        writeln!(sink, "      </trkpt>")?;
        Ok(())
    }

    fn write_way_point<W: Write>(&self, wp: &WayPoint, sink: &mut W) -> io::Result<()> {
        writeln!(
            sink,
            r#"  <wpt lat="{}" lon="{}">"#,
            fmt_decimal(wp.lat),
            fmt_decimal(wp.lon)
        )?;
        if let Some(ele) = wp.elevation {
            writeln!(sink, "    <ele>{}</ele>", fmt_decimal(ele))?;
        }
        writeln!(sink, "    <time>{}</time>", gpx_time(wp.time_ms))?;

        // Accuracy placement depends on the configured policy; compass
        // comments are merged into the same <cmt> when both apply.
        let mut comment = String::new();
        let name = match (self.prefs.accuracy_output, wp.accuracy) {
            (AccuracyOutput::WptName, Some(accuracy)) => {
                format!("{} ({}{})", wp.name, fmt_decimal(accuracy), self.prefs.meter_unit)
            }
            (AccuracyOutput::WptComment, Some(accuracy)) => {
                comment = format!("accuracy: {}{}", fmt_decimal(accuracy), self.prefs.meter_unit);
                wp.name.clone()
            }
            _ => wp.name.clone(),
        };
        if self.prefs.compass_output == CompassOutput::Comment {
            if let Some(heading) = wp.heading {
                let compass = compass_text(heading, wp.heading_accuracy);
                if comment.is_empty() {
                    comment = compass;
                } else {
                    comment = format!("{comment}; {compass}");
                }
            }
        }

        writeln!(sink, "    <name>{}</name>", cdata(&name))?;
        if !comment.is_empty() {
            writeln!(sink, "    <cmt>{}</cmt>", cdata(&comment))?;
        }
        if let Some(link) = &wp.link {
            writeln!(sink, r#"    <link href="{}">"#, encode_href(link))?;
            writeln!(sink, "      <text>{}</text>", cdata(link))?;
            writeln!(sink, "    </link>")?;
        }
        if let Some(sat) = wp.satellites {
            writeln!(sink, "    <sat>{sat}</sat>")?;
        }
        if self.prefs.fill_hdop {
            if let Some(accuracy) = wp.accuracy {
                writeln!(sink, "    <hdop>{}</hdop>", fmt_decimal(accuracy / HDOP_FACTOR))?;
            }
        }
        if self.prefs.compass_output == CompassOutput::Extension {
            if let Some(heading) = wp.heading {
                writeln!(sink, "    <extensions>")?;
                writeln!(sink, "      <compass>{}</compass>", fmt_decimal(heading))?;
                if let Some(acc) = wp.heading_accuracy {
                    writeln!(sink, "      <compass_accuracy>{}</compass_accuracy>", fmt_decimal(acc))?;
                }
                writeln!(sink, "    </extensions>")?;
            }
        }
        writeln!(sink, "  </wpt>")?;
        Ok(())
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ` (UTC) for epoch milliseconds.
fn gpx_time(time_ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(time_ms) * 1_000_000)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(GPX_TIME)
        .unwrap_or_default()
}

/// Decimal rendering that always keeps a fractional part: `24.0`, not `24`.
fn fmt_decimal(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn compass_text(heading: f64, accuracy: Option<f64>) -> String {
    match accuracy {
        Some(acc) => format!("compass: {}deg +/- {}deg", fmt_decimal(heading), fmt_decimal(acc)),
        None => format!("compass: {}deg", fmt_decimal(heading)),
    }
}

/// Wraps free text in a CDATA section; an embedded `]]>` is split across two
/// sections so the output stays well-formed.
fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

/// Percent-encodes a link for use as an XML `href` attribute value. RFC 3986
/// unreserved and reserved characters pass through, except the XML-significant
/// `&`, `'` and `"` which are always encoded.
fn encode_href(link: &str) -> String {
    const KEEP: &[u8] = b"-._~:/?#[]@!$*+,;=()";
    let mut out = String::with_capacity(link.len());
    for byte in link.bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::FilenamePolicy;

    const START: i64 = 990055225000;

    fn point(time_ms: i64) -> TrackPoint {
        TrackPoint {
            lat: 10.0,
            lon: -84.0,
            time_ms,
            elevation: None,
            accuracy: None,
            speed: None,
            heading: None,
            heading_accuracy: None,
        }
    }

    fn waypoint(time_ms: i64, name: &str) -> WayPoint {
        WayPoint {
            lat: 10.5,
            lon: -84.5,
            time_ms,
            name: name.to_string(),
            uid: "wp-1".to_string(),
            link: None,
            elevation: None,
            accuracy: None,
            satellites: None,
            heading: None,
            heading_accuracy: None,
        }
    }

    fn prefs() -> ExportPreferences {
        let mut prefs = ExportPreferences::with_base_dir("/tmp");
        prefs.filename_policy = FilenamePolicy::DateOnly;
        prefs
    }

    fn render(prefs: &ExportPreferences, points: &[TrackPoint], wps: &[WayPoint]) -> String {
        let mut out = Vec::new();
        GpxWriter::new(prefs)
            .write_document(points, wps, &mut out, &NoProgress, &CancelToken::new())
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn header_and_track_label() {
        let doc = render(&prefs(), &[point(START)], &[]);
        assert!(doc.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(doc.contains(r#"<gpx version="1.1" creator="gpx-export/"#));
        assert!(doc.contains(r#"xmlns="http://www.topografix.com/GPX/1/1""#));
        assert!(doc.contains("<name><![CDATA[Track]]></name>"));
        assert!(doc.contains("<time>2001-05-16T23:20:25Z</time>"));
        assert!(doc.trim_end().ends_with("</gpx>"));
    }

    #[test]
    fn hdop_is_accuracy_divided_by_fixed_factor() {
        let mut p = prefs();
        p.fill_hdop = true;
        let mut tp = point(START);
        tp.accuracy = Some(35.0);
        let doc = render(&p, &[tp], &[]);
        assert!(doc.contains("<hdop>8.75</hdop>"), "{doc}");
        assert!(doc.contains("<cmt><![CDATA[hdop values are approximated"), "{doc}");
    }

    #[test]
    fn hdop_omitted_without_accuracy() {
        let mut p = prefs();
        p.fill_hdop = true;
        let doc = render(&p, &[point(START)], &[]);
        assert!(!doc.contains("<hdop>"));
    }

    #[test]
    fn waypoint_accuracy_in_name() {
        let mut p = prefs();
        p.accuracy_output = AccuracyOutput::WptName;
        let mut wp = waypoint(START, "Point A");
        wp.accuracy = Some(24.0);
        let doc = render(&p, &[], &[wp]);
        assert!(doc.contains("<name><![CDATA[Point A (24.0m)]]></name>"), "{doc}");
        assert!(!doc.contains("<cmt>"));
    }

    #[test]
    fn waypoint_accuracy_in_comment() {
        let mut p = prefs();
        p.accuracy_output = AccuracyOutput::WptComment;
        let mut wp = waypoint(START, "Point A");
        wp.accuracy = Some(24.0);
        let doc = render(&p, &[], &[wp]);
        assert!(doc.contains("<name><![CDATA[Point A]]></name>"));
        assert!(doc.contains("<cmt><![CDATA[accuracy: 24.0m]]></cmt>"), "{doc}");
    }

    #[test]
    fn waypoint_without_accuracy_keeps_plain_name() {
        let mut p = prefs();
        p.accuracy_output = AccuracyOutput::WptName;
        let doc = render(&p, &[], &[waypoint(START, "Point A")]);
        assert!(doc.contains("<name><![CDATA[Point A]]></name>"));
    }

    #[test]
    fn compass_comment_merges_with_accuracy_comment() {
        let mut p = prefs();
        p.accuracy_output = AccuracyOutput::WptComment;
        p.compass_output = CompassOutput::Comment;
        let mut wp = waypoint(START, "Point A");
        wp.accuracy = Some(24.0);
        wp.heading = Some(120.0);
        wp.heading_accuracy = Some(5.0);
        let doc = render(&p, &[], &[wp]);
        assert!(
            doc.contains("<cmt><![CDATA[accuracy: 24.0m; compass: 120.0deg +/- 5.0deg]]></cmt>"),
            "{doc}"
        );
    }

    #[test]
    fn compass_extension_mode_emits_extensions_block() {
        let mut p = prefs();
        p.compass_output = CompassOutput::Extension;
        let mut tp = point(START);
        tp.heading = Some(120.0);
        tp.heading_accuracy = Some(5.0);
        tp.speed = Some(3.2);
        let doc = render(&p, &[tp], &[]);
        assert!(doc.contains("<speed>3.2</speed>"));
        assert!(doc.contains("<compass>120.0</compass>"));
        assert!(doc.contains("<compass_accuracy>5.0</compass_accuracy>"));
    }

    #[test]
    fn empty_extensions_block_is_omitted() {
        let mut p = prefs();
        p.compass_output = CompassOutput::Extension;
        let doc = render(&p, &[point(START)], &[]);
        assert!(!doc.contains("<extensions>"));
    }

    #[test]
    fn compass_heading_ignored_outside_extension_mode() {
        let p = prefs();
        let mut tp = point(START);
        tp.heading = Some(120.0);
        let doc = render(&p, &[tp], &[]);
        assert!(!doc.contains("compass"));
    }

    #[test]
    fn link_href_is_encoded_and_text_is_raw() {
        let mut wp = waypoint(START, "Photo");
        wp.link = Some("my photo & more.jpg".to_string());
        let doc = render(&prefs(), &[], &[wp]);
        assert!(doc.contains(r#"<link href="my%20photo%20%26%20more.jpg">"#), "{doc}");
        assert!(doc.contains("<text><![CDATA[my photo & more.jpg]]></text>"));
    }

    #[test]
    fn cdata_tolerates_terminator_in_names() {
        let doc = render(&prefs(), &[], &[waypoint(START, "evil ]]> name")]);
        assert!(doc.contains("<name><![CDATA[evil ]]]]><![CDATA[> name]]></name>"), "{doc}");
    }

    #[test]
    fn zero_waypoints_still_produces_valid_track_block() {
        let doc = render(&prefs(), &[point(START), point(START + 1000)], &[]);
        assert!(!doc.contains("<wpt"));
        assert!(doc.contains("<trkseg>"));
        assert_eq!(doc.matches("<trkpt").count(), 2);
    }

    #[test]
    fn identical_inputs_render_byte_identical_documents() {
        let p = prefs();
        let points = vec![point(START), point(START + 5000)];
        let wps = vec![waypoint(START + 2000, "A")];
        assert_eq!(render(&p, &points, &wps), render(&p, &points, &wps));
    }

    #[test]
    fn cancellation_stops_between_points() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let p = prefs();
        let mut out = Vec::new();
        let err = GpxWriter::new(&p)
            .write_document(&[point(START)], &[], &mut out, &NoProgress, &cancel)
            .unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
    }

    struct Recording {
        started: Mutex<Option<(u64, u64)>>,
        advanced: Mutex<Vec<u64>>,
    }

    impl ProgressSink for Recording {
        fn started(&self, track_points: u64, way_points: u64) {
            *self.started.lock().unwrap() = Some((track_points, way_points));
        }

        fn advanced(&self, points_done: u64) {
            self.advanced.lock().unwrap().push(points_done);
        }
    }

    #[test]
    fn progress_reports_totals_then_every_point_for_small_tracks() {
        let sink = Recording {
            started: Mutex::new(None),
            advanced: Mutex::new(Vec::new()),
        };
        let points = vec![point(START), point(START + 1000), point(START + 2000)];
        let wps = vec![waypoint(START + 1500, "A")];
        let mut out = Vec::new();
        GpxWriter::new(&prefs())
            .write_document(&points, &wps, &mut out, &sink, &CancelToken::new())
            .unwrap();

        assert_eq!(*sink.started.lock().unwrap(), Some((3, 1)));
        // Fewer than 100 points: granularity clamps to one report per point.
        assert_eq!(*sink.advanced.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn parse_back_preserves_counts_and_order() {
        let mut p = prefs();
        p.accuracy_output = AccuracyOutput::WptComment;
        let points: Vec<TrackPoint> = (0..5).map(|i| point(START + i * 1000)).collect();
        let wps: Vec<WayPoint> = (0..3)
            .map(|i| waypoint(START + i * 2000, &format!("wp{i}")))
            .collect();
        let doc = render(&p, &points, &wps);

        let parsed: gpx::Gpx = gpx::read(doc.as_bytes()).unwrap();
        assert_eq!(parsed.tracks.len(), 1);
        assert_eq!(parsed.tracks[0].segments.len(), 1);
        assert_eq!(parsed.tracks[0].segments[0].points.len(), 5);
        assert_eq!(parsed.waypoints.len(), 3);

        let times: Vec<OffsetDateTime> = parsed.tracks[0].segments[0]
            .points
            .iter()
            .map(|pt| OffsetDateTime::from(pt.time.unwrap()))
            .collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);

        let names: Vec<_> = parsed
            .waypoints
            .iter()
            .map(|wp| wp.name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["wp0", "wp1", "wp2"]);
    }
}
