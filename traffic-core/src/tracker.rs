//! Target reconciliation against ownship.
//!
//! Pure logic without I/O or locking. The tracker is a `&mut self` state
//! machine; the caller decides how to share it between decoder tasks, the
//! heartbeat sweep and the render loop (see [`SharedTracker`]).
//!
//! Every `update` wholesale-replaces the stored record for its identity and
//! recomputes distance, bearing and altitude difference. Numeric trouble
//! (NaN from the solver, far-away targets, missing ownship fields) leaves
//! the computed field unset instead of failing.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::geodesy::{GeodeticSolver, Wgs84};
use crate::store::TrafficSet;
use crate::types::{unix_now, OwnshipReference, Target};

/// Meters to statute miles.
pub const METERS_TO_MILES: f64 = 0.0006213712;

/// Distances at or beyond this are treated as solver breakdown and unset.
pub const SOLVER_BREAKDOWN_MI: f64 = 500.0;

/// Default eviction age in seconds.
pub const DEFAULT_MAX_AGE_SEC: f64 = 100.0;

/// A tracker shared between producer tasks and readers.
pub type SharedTracker<S = Wgs84> = Arc<RwLock<TrafficTracker<S>>>;

// ---------------------------------------------------------------------------
// Outcomes and counters
// ---------------------------------------------------------------------------

/// Result of applying one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Stored (inserted or replaced).
    Upserted,
    /// Outside the ignore-beyond distance; any stored record was removed.
    Filtered,
    /// Empty identity; nothing stored.
    InvalidIdentity,
}

/// Running counters since the tracker was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub updates: u64,
    pub upserts: u64,
    pub filtered: u64,
    pub invalid: u64,
    pub evicted: u64,
    pub buoys_dropped: u64,
    /// Buoy refreshes done by sweeps; not counted as updates.
    pub buoy_refreshes: u64,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Live proximity picture around ownship.
pub struct TrafficTracker<S: GeodeticSolver = Wgs84> {
    pub(crate) traffic: TrafficSet,
    pub(crate) solver: S,
    pub(crate) config: TrackerConfig,
    source_altitude_ft: Option<i32>,
    pub(crate) last_buoy_seq: u64,
    pub(crate) stats: TrackerStats,
}

impl TrafficTracker<Wgs84> {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_solver(config, Wgs84::new())
    }
}

impl Default for TrafficTracker<Wgs84> {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl<S: GeodeticSolver> TrafficTracker<S> {
    pub fn with_solver(config: TrackerConfig, solver: S) -> Self {
        TrafficTracker {
            traffic: TrafficSet::new(),
            solver,
            config,
            source_altitude_ft: None,
            last_buoy_seq: 0,
            stats: TrackerStats::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Change the ignore-beyond distance (0 disables).
    ///
    /// Stored records are not re-filtered: the new radius applies to each
    /// target on its next update, and to buoys on the next sweep.
    pub fn set_ignore_beyond_distance(&mut self, miles: f64) {
        debug!(
            from = self.config.ignore_beyond_distance_mi,
            to = miles,
            "ignore-beyond distance changed"
        );
        self.config.ignore_beyond_distance_mi = miles;
    }

    pub fn set_max_age(&mut self, seconds: f64) {
        self.config.max_age_sec = seconds;
    }

    /// Altitude reported by the traffic source box itself, if it has one.
    /// Takes precedence over ownship altitudes for altitude difference.
    pub fn set_source_altitude(&mut self, altitude_ft: Option<i32>) {
        self.source_altitude_ft = altitude_ft;
    }

    pub fn source_altitude(&self) -> Option<i32> {
        self.source_altitude_ft
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    pub fn traffic(&self) -> &TrafficSet {
        &self.traffic
    }

    pub fn count(&self) -> usize {
        self.traffic.len()
    }

    pub fn get(&self, identity: &str) -> Option<&Target> {
        self.traffic.get(identity)
    }

    /// Apply one update stamped with the current time.
    pub fn update(&mut self, ownship: &OwnshipReference, incoming: Target) -> Outcome {
        self.update_at(ownship, incoming, unix_now())
    }

    /// Apply one update stamped with `now`.
    pub fn update_at(&mut self, ownship: &OwnshipReference, incoming: Target, now: f64) -> Outcome {
        let outcome = self.reconcile(ownship, incoming, now);
        self.stats.updates += 1;
        match outcome {
            Outcome::Upserted => self.stats.upserts += 1,
            Outcome::Filtered => self.stats.filtered += 1,
            Outcome::InvalidIdentity => self.stats.invalid += 1,
        }
        outcome
    }

    /// The update pipeline without counters. Sweeps use this directly so
    /// buoy refreshes do not show up as decoder traffic.
    pub(crate) fn reconcile(&mut self, ownship: &OwnshipReference, mut incoming: Target, now: f64) -> Outcome {
        if incoming.identity.trim().is_empty() {
            debug!("rejected target update with empty identity");
            return Outcome::InvalidIdentity;
        }

        incoming.last_seen = now;
        incoming.age = 0.0;

        let (bearing, distance) = match ownship.position() {
            Some((own_lat, own_lon)) if incoming.has_fix() => {
                relative_position(&self.solver, own_lat, own_lon, incoming.lat, incoming.lon)
            }
            _ => (None, None),
        };
        incoming.bearing_deg = bearing;
        incoming.distance_mi = distance;

        let limit = self.config.ignore_beyond_distance_mi;
        if limit != 0.0 && distance.is_none_or(|d| d > limit) {
            if self.traffic.remove(&incoming.identity).is_some() {
                debug!(identity = %incoming.identity, ?distance, limit, "target left the ignore-beyond radius");
            }
            return Outcome::Filtered;
        }

        incoming.alt_diff_ft = match (incoming.altitude_ft, self.reference_altitude(ownship)) {
            (Some(alt), Some(reference)) => alt.checked_sub(reference),
            _ => None,
        };

        self.traffic.put(incoming);
        Outcome::Upserted
    }

    /// Source-box altitude, then pressure altitude, then GPS altitude.
    fn reference_altitude(&self, ownship: &OwnshipReference) -> Option<i32> {
        self.source_altitude_ft
            .or(ownship.pressure_alt_ft)
            .or(ownship.gps_alt_ft)
    }

    /// Closest target with a resolved distance no greater than `max_distance_mi`.
    pub fn nearest(&self, max_distance_mi: f64) -> Option<&Target> {
        self.traffic
            .iter()
            .filter_map(|t| t.distance_mi.filter(|d| *d <= max_distance_mi).map(|d| (d, t)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, t)| t)
    }

    /// All stored targets, unordered.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.traffic.iter()
    }

    /// All targets, nearest first; unresolved distances last.
    pub fn sorted_by_distance(&self) -> Vec<&Target> {
        let mut all: Vec<&Target> = self.traffic.iter().collect();
        all.sort_by(|a, b| match (a.distance_mi, b.distance_mi) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.identity.cmp(&b.identity),
        });
        all
    }

    /// Proximity-filtered listing: resolved distance within `max_distance_mi`, nearest first.
    pub fn within(&self, max_distance_mi: f64) -> Vec<&Target> {
        let mut near: Vec<&Target> = self
            .traffic
            .iter()
            .filter(|t| t.distance_mi.is_some_and(|d| d <= max_distance_mi))
            .collect();
        near.sort_by(|a, b| {
            a.distance_mi
                .unwrap_or(f64::INFINITY)
                .total_cmp(&b.distance_mi.unwrap_or(f64::INFINITY))
        });
        near
    }

    /// Recompute the `age` field on every target without evicting anything.
    pub fn refresh_ages(&mut self, now: f64) {
        for target in self.traffic.iter_mut() {
            target.age = target.age_at(now);
        }
    }

    pub fn remove(&mut self, identity: &str) -> Option<Target> {
        self.traffic.remove(identity)
    }

    pub fn clear(&mut self) {
        self.traffic.clear();
    }
}

/// Bearing (0–360) and distance (miles) from the solver, with its failure
/// modes mapped to `None`.
fn relative_position<S: GeodeticSolver>(
    solver: &S,
    own_lat: f64,
    own_lon: f64,
    lat: f64,
    lon: f64,
) -> (Option<f64>, Option<f64>) {
    let (azimuth, meters) = solver.inverse(own_lat, own_lon, lat, lon);

    let miles = meters * METERS_TO_MILES;
    if beyond_solver_range(miles) {
        return (None, None);
    }
    let distance = if miles.is_nan() { None } else { Some(miles) };

    let bearing = if azimuth.is_nan() {
        None
    } else if azimuth < 0.0 {
        Some(360.0 + azimuth)
    } else {
        Some(azimuth)
    };

    (bearing, distance)
}

/// The solver is not trusted this far out; both bearing and distance are dropped.
fn beyond_solver_range(miles: f64) -> bool {
    miles >= SOLVER_BREAKDOWN_MI
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
