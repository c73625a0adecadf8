//! Operator-dropped buoys.
//!
//! A buoy is a synthetic target pinned to a point on the ground, either at
//! ownship's current position or projected ahead along ownship's heading.
//! Once dropped it goes through the same `update` path as real traffic and
//! is refreshed by every sweep, so it never ages out.

use serde::Deserialize;
use tracing::{info, warn};

use crate::geodesy::{GeodeticSolver, METERS_PER_MILE};
use crate::tracker::TrafficTracker;
use crate::types::{unix_now, OwnshipReference, Target, TargetKind};

/// Emitter category stamped on buoys. Real ADS-B categories stay below 40.
pub const BUOY_EMITTER_CATEGORY: u8 = 100;

/// Speed given to a buoy when the caller does not ask for one.
pub const DEFAULT_BUOY_SPEED_KTS: f64 = 100.0;

/// Distance for "ahead" placement when none is given.
pub const DEFAULT_AHEAD_DISTANCE_MI: f64 = 1.0;

/// Speed argument value that means "copy ownship's speed".
pub const MIRROR_OWNSHIP_SPEED: f64 = -1.0;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// How the buoy's speed is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum BuoySpeed {
    /// No speed argument: [`DEFAULT_BUOY_SPEED_KTS`].
    #[default]
    Default,
    /// IAS if nonzero, else ground speed if nonzero, else 0.
    MirrorOwnship,
    Fixed(f64),
}

impl From<Option<f64>> for BuoySpeed {
    fn from(speed: Option<f64>) -> Self {
        match speed {
            None => BuoySpeed::Default,
            Some(s) if s == MIRROR_OWNSHIP_SPEED => BuoySpeed::MirrorOwnship,
            Some(s) => BuoySpeed::Fixed(s),
        }
    }
}

impl BuoySpeed {
    pub fn resolve(self, ownship: &OwnshipReference) -> f64 {
        match self {
            BuoySpeed::Default => DEFAULT_BUOY_SPEED_KTS,
            BuoySpeed::Fixed(s) => s,
            BuoySpeed::MirrorOwnship => ownship
                .ias_kts
                .filter(|s| *s != 0.0)
                .or(ownship.ground_speed_kts.filter(|s| *s != 0.0))
                .unwrap_or(0.0),
        }
    }
}

/// Where the buoy goes relative to ownship.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    #[default]
    AtOwnship,
    Ahead,
}

impl Placement {
    /// `"ahead"` projects forward; anything else drops at ownship.
    pub fn from_direction(direction: Option<&str>) -> Self {
        match direction {
            Some(d) if d.eq_ignore_ascii_case("ahead") => Placement::Ahead,
            _ => Placement::AtOwnship,
        }
    }
}

/// Operator parameters for a buoy drop. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BuoyRequest {
    pub name: Option<String>,
    /// Knots; `-1` mirrors ownship, absent uses the default.
    pub speed: Option<f64>,
    pub direction: Option<String>,
    pub distance_mi: Option<f64>,
    pub alt_offset_ft: Option<i32>,
}

impl BuoyRequest {
    pub fn ahead(distance_mi: f64) -> Self {
        BuoyRequest {
            direction: Some("ahead".into()),
            distance_mi: Some(distance_mi),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker operations
// ---------------------------------------------------------------------------

impl<S: GeodeticSolver> TrafficTracker<S> {
    pub fn drop_buoy(&mut self, ownship: &OwnshipReference, request: BuoyRequest) -> Target {
        self.drop_buoy_at(ownship, request, unix_now())
    }

    /// Create a buoy and push it through `update_at`.
    ///
    /// A buoy never replaces a stored target: if the requested or generated
    /// name is already taken, `-{seq}` is appended until it is free.
    ///
    /// Returns the stored record, or the unstored one if the ignore-beyond
    /// radius filtered it out.
    pub fn drop_buoy_at(
        &mut self,
        ownship: &OwnshipReference,
        request: BuoyRequest,
        now: f64,
    ) -> Target {
        self.last_buoy_seq += 1;
        let seq = self.last_buoy_seq;

        let mut identity = request
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Buoy{seq}"));
        while self.traffic.contains(&identity) {
            identity = format!("{identity}-{seq}");
        }

        let placement = Placement::from_direction(request.direction.as_deref());
        let (lat, lon) = self.buoy_position(ownship, placement, request.distance_mi);

        let buoy = Target {
            identity: identity.clone(),
            kind: TargetKind::Buoy,
            lat,
            lon,
            altitude_ft: match (ownship.gps_alt_ft, request.alt_offset_ft) {
                (Some(alt), Some(offset)) => Some(alt.saturating_add(offset)),
                (alt, None) => alt,
                (None, Some(_)) => None,
            },
            track_deg: ownship.track(),
            speed_kts: Some(BuoySpeed::from(request.speed).resolve(ownship)),
            emitter_category: Some(BUOY_EMITTER_CATEGORY),
            source: Some("buoy".into()),
            buoy_seq: Some(seq),
            ..Default::default()
        };

        self.stats.buoys_dropped += 1;
        let outcome = self.update_at(ownship, buoy.clone(), now);
        info!(%identity, seq, lat, lon, ?outcome, "buoy dropped");

        self.traffic.get(&identity).cloned().unwrap_or(buoy)
    }

    fn buoy_position(
        &self,
        ownship: &OwnshipReference,
        placement: Placement,
        distance_mi: Option<f64>,
    ) -> (f64, f64) {
        let Some((own_lat, own_lon)) = ownship.position() else {
            return (0.0, 0.0);
        };
        let (Placement::Ahead, Some(azimuth)) = (placement, ownship.track()) else {
            return (own_lat, own_lon);
        };

        let meters = distance_mi.unwrap_or(DEFAULT_AHEAD_DISTANCE_MI) * METERS_PER_MILE;
        let (lat, lon) = self.solver.direct(own_lat, own_lon, azimuth, meters);
        if lat.is_finite() && lon.is_finite() {
            (lat, lon)
        } else {
            warn!(azimuth, meters, "buoy projection failed, dropping at ownship");
            (own_lat, own_lon)
        }
    }

    /// Remove every buoy. Returns how many were removed.
    pub fn clear_all_buoys(&mut self) -> usize {
        let doomed: Vec<String> = self
            .traffic
            .iter()
            .filter(|t| t.is_buoy())
            .map(|t| t.identity.clone())
            .collect();
        for identity in &doomed {
            self.traffic.remove(identity);
        }
        if !doomed.is_empty() {
            info!(removed = doomed.len(), "cleared buoys");
        }
        doomed.len()
    }

    /// Buoys currently stored, ordered by sequence number.
    pub fn buoys(&self) -> Vec<&Target> {
        let mut buoys: Vec<&Target> = self.traffic.iter().filter(|t| t.is_buoy()).collect();
        buoys.sort_by_key(|t| t.buoy_seq);
        buoys
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::tracker::tests::{ownship, LonIsMiles};

    fn tracker() -> TrafficTracker<LonIsMiles> {
        TrafficTracker::with_solver(TrackerConfig::default(), LonIsMiles)
    }

    fn speed_for(speed: Option<f64>, ias: Option<f64>, gs: Option<f64>) -> f64 {
        let own = OwnshipReference {
            ias_kts: ias,
            ground_speed_kts: gs,
            ..ownship()
        };
        let mut tracker = tracker();
        let request = BuoyRequest {
            speed,
            ..Default::default()
        };
        tracker.drop_buoy_at(&own, request, 0.0).speed_kts.unwrap()
    }

    #[test]
    fn test_buoy_sequencing() {
        let mut tracker = tracker();
        let ids: Vec<String> = (0..3)
            .map(|_| tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 0.0).identity)
            .collect();
        assert_eq!(ids, ["Buoy1", "Buoy2", "Buoy3"]);
        assert_eq!(tracker.count(), 3);
    }

    #[test]
    fn test_buoy_counter_survives_clear() {
        let mut tracker = tracker();
        tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 0.0);
        tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 0.0);
        assert_eq!(tracker.clear_all_buoys(), 2);

        let next = tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 1.0);
        assert_eq!(next.identity, "Buoy3");
        assert_eq!(next.buoy_seq, Some(3));
    }

    #[test]
    fn test_named_buoy_still_consumes_sequence() {
        let mut tracker = tracker();
        let named = BuoyRequest {
            name: Some("HOME".into()),
            ..Default::default()
        };
        let b = tracker.drop_buoy_at(&ownship(), named, 0.0);
        assert_eq!(b.identity, "HOME");
        assert_eq!(b.buoy_seq, Some(1));

        let next = tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 0.0);
        assert_eq!(next.identity, "Buoy2");
    }

    #[test]
    fn test_named_buoy_does_not_replace_remote_target() {
        let mut tracker = tracker();
        tracker.update_at(&ownship(), Target::new("A1B2C3", 1.0, 2.0), 0.0);
        let named = BuoyRequest {
            name: Some("A1B2C3".into()),
            ..Default::default()
        };
        let b = tracker.drop_buoy_at(&ownship(), named, 0.0);
        assert_eq!(b.identity, "A1B2C3-1");
        assert_eq!(tracker.get("A1B2C3").unwrap().kind, TargetKind::Remote);
        assert_eq!(tracker.count(), 2);
    }

    #[test]
    fn test_generated_name_skips_taken_identity() {
        let mut tracker = tracker();
        let named = BuoyRequest {
            name: Some("Buoy2".into()),
            ..Default::default()
        };
        assert_eq!(tracker.drop_buoy_at(&ownship(), named, 0.0).identity, "Buoy2");

        let next = tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 0.0);
        assert_eq!(next.identity, "Buoy2-2");
        assert_eq!(next.buoy_seq, Some(2));
        assert_eq!(tracker.get("Buoy2").unwrap().buoy_seq, Some(1));
        assert_eq!(tracker.buoys().len(), 2);
    }

    #[test]
    fn test_buoy_speed_resolution() {
        assert_eq!(speed_for(Some(-1.0), Some(120.0), Some(80.0)), 120.0);
        assert_eq!(speed_for(Some(-1.0), Some(0.0), Some(80.0)), 80.0);
        assert_eq!(speed_for(Some(-1.0), Some(0.0), Some(0.0)), 0.0);
        assert_eq!(speed_for(Some(-1.0), None, None), 0.0);
        assert_eq!(speed_for(None, Some(120.0), Some(80.0)), 100.0);
        assert_eq!(speed_for(Some(42.0), Some(120.0), Some(80.0)), 42.0);
        assert_eq!(speed_for(Some(0.0), Some(120.0), Some(80.0)), 0.0);
    }

    #[test]
    fn test_buoy_fields_from_ownship() {
        let mut tracker = tracker();
        let b = tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 7.0);
        assert_eq!(b.kind, TargetKind::Buoy);
        assert_eq!((b.lat, b.lon), (35.5, -82.5));
        assert_eq!(b.altitude_ft, Some(4700));
        assert_eq!(b.track_deg, Some(90.0));
        assert_eq!(b.emitter_category, Some(BUOY_EMITTER_CATEGORY));
        assert_eq!(b.last_seen, 7.0);
        assert!(b.distance_mi.is_some());
    }

    #[test]
    fn test_buoy_altitude_offset() {
        let mut tracker = tracker();
        let request = BuoyRequest {
            alt_offset_ft: Some(-500),
            ..Default::default()
        };
        let b = tracker.drop_buoy_at(&ownship(), request, 0.0);
        assert_eq!(b.altitude_ft, Some(4200));
        // pressure altitude 4500 is the reference
        assert_eq!(b.alt_diff_ft, Some(-300));
    }

    #[test]
    fn test_buoy_track_falls_back_to_ground_track() {
        let mut tracker = tracker();
        let own = OwnshipReference {
            heading_deg: None,
            ..ownship()
        };
        let b = tracker.drop_buoy_at(&own, BuoyRequest::default(), 0.0);
        assert_eq!(b.track_deg, Some(92.0));
    }

    #[test]
    fn test_buoy_ahead_projects_along_heading() {
        let mut tracker = TrafficTracker::default();
        let own = OwnshipReference {
            lat: Some(0.0),
            lon: Some(0.0),
            heading_deg: Some(90.0),
            ..Default::default()
        };
        let b = tracker.drop_buoy_at(&own, BuoyRequest::ahead(2.0), 0.0);
        assert!(b.lat.abs() < 1e-9);
        assert!(b.lon > 0.0);
        assert!((b.distance_mi.unwrap() - 2.0).abs() < 0.001);
        assert!((b.bearing_deg.unwrap() - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_buoy_ahead_default_distance() {
        let mut tracker = TrafficTracker::default();
        let own = OwnshipReference {
            lat: Some(35.5),
            lon: Some(-82.5),
            heading_deg: Some(0.0),
            ..Default::default()
        };
        let request = BuoyRequest {
            direction: Some("ahead".into()),
            ..Default::default()
        };
        let b = tracker.drop_buoy_at(&own, request, 0.0);
        assert!(b.lat > 35.5);
        assert!((b.distance_mi.unwrap() - DEFAULT_AHEAD_DISTANCE_MI).abs() < 0.001);
    }

    #[test]
    fn test_buoy_ahead_without_track_drops_at_ownship() {
        let mut tracker = TrafficTracker::default();
        let own = OwnshipReference {
            lat: Some(35.5),
            lon: Some(-82.5),
            ..Default::default()
        };
        let b = tracker.drop_buoy_at(&own, BuoyRequest::ahead(3.0), 0.0);
        assert_eq!((b.lat, b.lon), (35.5, -82.5));
    }

    #[test]
    fn test_buoy_without_ownship_fix() {
        let mut tracker = tracker();
        let b = tracker.drop_buoy_at(&OwnshipReference::default(), BuoyRequest::default(), 0.0);
        assert!(!b.has_fix());
        assert!(b.distance_mi.is_none());
        assert!(b.altitude_ft.is_none());
        assert!(tracker.traffic().contains("Buoy1"));
    }

    #[test]
    fn test_filtered_buoy_is_returned_unstored() {
        let mut tracker = TrafficTracker::with_solver(
            TrackerConfig {
                ignore_beyond_distance_mi: 10.0,
                ..Default::default()
            },
            LonIsMiles,
        );
        let own = OwnshipReference {
            lon: Some(20.0),
            ..ownship()
        };
        let b = tracker.drop_buoy_at(&own, BuoyRequest::default(), 0.0);
        assert_eq!(b.identity, "Buoy1");
        assert!(!tracker.traffic().contains("Buoy1"));
    }

    #[test]
    fn test_clear_all_buoys_interleaved() {
        let mut tracker = tracker();
        for i in 0..5 {
            tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 0.0);
            tracker.update_at(&ownship(), Target::new(format!("N{i}"), 1.0, 2.0), 0.0);
        }
        assert_eq!(tracker.count(), 10);

        assert_eq!(tracker.clear_all_buoys(), 5);
        assert_eq!(tracker.count(), 5);
        assert!(tracker.targets().all(|t| t.kind == TargetKind::Remote));
        for i in 0..5 {
            assert!(tracker.traffic().contains(&format!("N{i}")));
        }
        assert_eq!(tracker.clear_all_buoys(), 0);
    }

    #[test]
    fn test_buoys_listing_ordered() {
        let mut tracker = tracker();
        for _ in 0..4 {
            tracker.drop_buoy_at(&ownship(), BuoyRequest::default(), 0.0);
        }
        tracker.update_at(&ownship(), Target::new("N1", 1.0, 2.0), 0.0);
        let seqs: Vec<Option<u64>> = tracker.buoys().iter().map(|b| b.buoy_seq).collect();
        assert_eq!(seqs, [Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_request_deserialize() {
        let r: BuoyRequest =
            serde_json::from_str(r#"{"speed": -1, "direction": "ahead", "distance_mi": 2.5}"#)
                .unwrap();
        assert_eq!(BuoySpeed::from(r.speed), BuoySpeed::MirrorOwnship);
        assert_eq!(
            Placement::from_direction(r.direction.as_deref()),
            Placement::Ahead
        );
        assert_eq!(r.distance_mi, Some(2.5));

        let r: BuoyRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(BuoySpeed::from(r.speed), BuoySpeed::Default);
    }
}
