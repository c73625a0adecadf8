//! Shared types, error enum, and the target/ownship records for traffic-core.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by traffic-core.
///
/// The tracker itself never fails: malformed numbers degrade to unset
/// fields and a missing identity is an [`Outcome`](crate::tracker::Outcome).
/// These variants cover the I/O edges around it.
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("feed error on line {line}: {reason}")]
    Feed { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, TrafficError>;

/// Current wall-clock time as seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Ownship
// ---------------------------------------------------------------------------

/// Snapshot of the reference aircraft. Every field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnshipReference {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub pressure_alt_ft: Option<i32>,
    pub gps_alt_ft: Option<i32>,
    pub heading_deg: Option<f64>,
    pub ground_track_deg: Option<f64>,
    pub ias_kts: Option<f64>,
    pub ground_speed_kts: Option<f64>,
}

impl OwnshipReference {
    /// Ownship position, only when both coordinates are known.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Heading if known, otherwise ground track.
    pub fn track(&self) -> Option<f64> {
        self.heading_deg.or(self.ground_track_deg)
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Where a target came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Reported by an upstream decoder.
    #[default]
    Remote,
    /// Operator-dropped synthetic marker.
    Buoy,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Remote => write!(f, "remote"),
            TargetKind::Buoy => write!(f, "buoy"),
        }
    }
}

/// One tracked contact.
///
/// Decoders fill in the reported fields; `distance_mi`, `bearing_deg`,
/// `alt_diff_ft`, `last_seen` and `age` are owned by the tracker and are
/// never read from an incoming record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub identity: String,
    pub kind: TargetKind,

    // Position (WGS84 degrees). (0, 0) means "no fix".
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: Option<i32>,

    // Velocity
    pub track_deg: Option<f64>,
    pub speed_kts: Option<f64>,
    pub vertical_speed_fpm: Option<i32>,

    // Identification and integrity
    pub emitter_category: Option<u8>,
    pub nic: Option<u8>,
    pub nacp: Option<u8>,
    pub callsign: Option<String>,
    pub squawk: Option<String>,
    pub on_ground: Option<bool>,
    pub source: Option<String>,

    // Computed relative to ownship
    #[serde(skip_deserializing)]
    pub distance_mi: Option<f64>,
    #[serde(skip_deserializing)]
    pub bearing_deg: Option<f64>,
    #[serde(skip_deserializing)]
    pub alt_diff_ft: Option<i32>,
    #[serde(skip_deserializing)]
    pub last_seen: f64,
    #[serde(skip_deserializing)]
    pub age: f64,

    /// Sequence number, only on buoys.
    pub buoy_seq: Option<u64>,
}

impl Target {
    pub fn new(identity: impl Into<String>, lat: f64, lon: f64) -> Self {
        Target {
            identity: identity.into(),
            lat,
            lon,
            ..Default::default()
        }
    }

    /// False for the (0, 0) sentinel decoders send before they have a fix.
    pub fn has_fix(&self) -> bool {
        !(self.lat == 0.0 && self.lon == 0.0)
    }

    pub fn is_buoy(&self) -> bool {
        self.kind == TargetKind::Buoy
    }

    pub fn age_at(&self, now: f64) -> f64 {
        now - self.last_seen
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
