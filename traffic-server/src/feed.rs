//! JSON-lines traffic feed, as written by decoders and recordings.
//!
//! One JSON object per line; blank lines and `#` comments are skipped.
//! Each object carries exactly one action:
//!
//! ```text
//! {"ownship": {"lat": 35.5, "lon": -82.5, "pressure_alt_ft": 4500}}
//! {"target": {"identity": "A1B2C3", "lat": 35.6, "lon": -82.4}, "ts": 12.0}
//! {"buoy": {"direction": "ahead", "distance_mi": 2}, "ts": 13.0}
//! {"source_alt_ft": 4650}
//! {"sweep": 20.0}
//! {"clear_buoys": true}
//! ```
//!
//! Lines without `ts` advance the replay clock by 0.1 s.

use std::io::BufRead;

use serde::{Deserialize, Deserializer};
use tracing::warn;

use traffic_core::{
    BuoyRequest, GeodeticSolver, OwnshipReference, Outcome, Result, SweepReport, Target,
    TrafficError, TrafficTracker,
};

/// Clock step for records without a timestamp.
const AUTO_STEP_SEC: f64 = 0.1;

/// One parsed feed line.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedRecord {
    Ownship(OwnshipReference),
    Target { target: Target, ts: Option<f64> },
    Buoy { request: BuoyRequest, ts: Option<f64> },
    SourceAltitude(Option<i32>),
    Sweep(f64),
    ClearBuoys,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLine {
    ownship: Option<OwnshipReference>,
    target: Option<Target>,
    buoy: Option<BuoyRequest>,
    #[serde(deserialize_with = "present")]
    source_alt_ft: Option<Option<i32>>,
    sweep: Option<f64>,
    clear_buoys: bool,
    ts: Option<f64>,
}

/// Distinguishes `"key": null` (Some(None)) from a missing key (None).
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

/// Parse one line. `Ok(None)` for blanks and comments.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<FeedRecord>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let raw: RawLine = serde_json::from_str(line).map_err(|e| TrafficError::Feed {
        line: line_no,
        reason: e.to_string(),
    })?;

    let mut records = Vec::with_capacity(1);
    if let Some(own) = raw.ownship {
        records.push(FeedRecord::Ownship(own));
    }
    if let Some(target) = raw.target {
        records.push(FeedRecord::Target { target, ts: raw.ts });
    }
    if let Some(request) = raw.buoy {
        records.push(FeedRecord::Buoy { request, ts: raw.ts });
    }
    if let Some(alt) = raw.source_alt_ft {
        records.push(FeedRecord::SourceAltitude(alt));
    }
    if let Some(ts) = raw.sweep {
        records.push(FeedRecord::Sweep(ts));
    }
    if raw.clear_buoys {
        records.push(FeedRecord::ClearBuoys);
    }

    match records.len() {
        1 => Ok(records.pop()),
        n => Err(TrafficError::Feed {
            line: line_no,
            reason: format!("expected exactly one action per line, found {n}"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Applying records
// ---------------------------------------------------------------------------

/// What applying a record did to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Ownship,
    Update(Outcome),
    Buoy(Target),
    SourceAltitude,
    Sweep(SweepReport),
    ClearedBuoys(usize),
}

/// Apply one record at time `now`.
pub fn apply_record<S: GeodeticSolver>(
    tracker: &mut TrafficTracker<S>,
    ownship: &mut OwnshipReference,
    record: FeedRecord,
    now: f64,
) -> Applied {
    match record {
        FeedRecord::Ownship(own) => {
            *ownship = own;
            Applied::Ownship
        }
        FeedRecord::Target { target, .. } => Applied::Update(tracker.update_at(ownship, target, now)),
        FeedRecord::Buoy { request, .. } => Applied::Buoy(tracker.drop_buoy_at(ownship, request, now)),
        FeedRecord::SourceAltitude(alt) => {
            tracker.set_source_altitude(alt);
            Applied::SourceAltitude
        }
        FeedRecord::Sweep(_) => Applied::Sweep(tracker.sweep_at(ownship, now)),
        FeedRecord::ClearBuoys => Applied::ClearedBuoys(tracker.clear_all_buoys()),
    }
}

/// Counters from a replay run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub lines: usize,
    pub records: usize,
    pub skipped: usize,
    pub upserted: usize,
    pub filtered: usize,
    pub invalid: usize,
    pub buoys: usize,
    pub sweeps: usize,
    pub removed: usize,
    /// Replay clock after the last record.
    pub clock: f64,
}

/// Replay a whole feed against `tracker`, driving time from the feed.
///
/// Malformed lines are logged and skipped.
pub fn replay<R: BufRead, S: GeodeticSolver>(
    reader: R,
    tracker: &mut TrafficTracker<S>,
    ownship: &mut OwnshipReference,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    let mut clock = 0.0f64;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        summary.lines += 1;
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(line = line_no, "unreadable feed line: {e}");
                summary.skipped += 1;
                continue;
            }
        };

        let record = match parse_line(&line, line_no) {
            Ok(Some(r)) => r,
            Ok(None) => continue,
            Err(e) => {
                warn!("{e}");
                summary.skipped += 1;
                continue;
            }
        };
        summary.records += 1;

        clock = match &record {
            FeedRecord::Target { ts: Some(ts), .. } | FeedRecord::Buoy { ts: Some(ts), .. } => *ts,
            FeedRecord::Sweep(ts) => *ts,
            FeedRecord::Target { .. } | FeedRecord::Buoy { .. } => clock + AUTO_STEP_SEC,
            _ => clock,
        };

        match apply_record(tracker, ownship, record, clock) {
            Applied::Update(Outcome::Upserted) => summary.upserted += 1,
            Applied::Update(Outcome::Filtered) => summary.filtered += 1,
            Applied::Update(Outcome::InvalidIdentity) => summary.invalid += 1,
            Applied::Buoy(_) => summary.buoys += 1,
            Applied::Sweep(report) => {
                summary.sweeps += 1;
                summary.removed += report.removed.len();
            }
            Applied::ClearedBuoys(n) => summary.removed += n,
            Applied::Ownship | Applied::SourceAltitude => {}
        }
    }

    summary.clock = clock;
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
