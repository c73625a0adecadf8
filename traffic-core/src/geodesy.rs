//! WGS84 geodesic solver.
//!
//! The tracker only needs two operations: the inverse problem (forward
//! azimuth and distance between two points) and the direct problem
//! (destination from origin, azimuth and distance). Both are behind
//! [`GeodeticSolver`] so boundary behavior can be exercised with stubs.
//!
//! Contract: no panics. Degenerate or unsolvable input yields NaN, which
//! callers turn into unset fields.

use geographiclib_rs::{DirectGeodesic, Geodesic, InverseGeodesic};

/// Meters in one statute mile.
pub const METERS_PER_MILE: f64 = 1609.344;

/// Ellipsoidal geodesy used by the tracker.
pub trait GeodeticSolver {
    /// Inverse problem. Returns `(forward azimuth in degrees, distance in meters)`.
    ///
    /// The azimuth is in `[-180, 180]`, not a compass bearing.
    fn inverse(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64);

    /// Direct problem. Returns `(lat2, lon2)` in degrees.
    fn direct(&self, lat1: f64, lon1: f64, azimuth_deg: f64, distance_m: f64) -> (f64, f64);
}

/// Karney's geodesic algorithms on the WGS84 ellipsoid.
pub struct Wgs84 {
    geod: Geodesic,
}

impl Wgs84 {
    pub fn new() -> Self {
        Wgs84 {
            geod: Geodesic::wgs84(),
        }
    }
}

impl Default for Wgs84 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Wgs84 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Wgs84")
    }
}

fn valid_point(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat)
}

impl GeodeticSolver for Wgs84 {
    fn inverse(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> (f64, f64) {
        if !valid_point(lat1, lon1) || !valid_point(lat2, lon2) {
            return (f64::NAN, f64::NAN);
        }
        let (s12, azi1, _azi2, _a12): (f64, f64, f64, f64) =
            self.geod.inverse(lat1, lon1, lat2, lon2);
        (azi1, s12)
    }

    fn direct(&self, lat1: f64, lon1: f64, azimuth_deg: f64, distance_m: f64) -> (f64, f64) {
        if !valid_point(lat1, lon1) || !azimuth_deg.is_finite() || !distance_m.is_finite() {
            return (f64::NAN, f64::NAN);
        }
        self.geod.direct(lat1, lon1, azimuth_deg, distance_m)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// One degree of longitude along the equator: a * pi / 180.
    const EQUATOR_DEGREE_M: f64 = 111_319.490_793;

    #[test]
    fn test_inverse_along_equator() {
        let g = Wgs84::new();
        let (azi, dist) = g.inverse(0.0, 0.0, 0.0, 1.0);
        assert!((azi - 90.0).abs() < 1e-6);
        assert!((dist - EQUATOR_DEGREE_M).abs() < 0.01);
    }

    #[test]
    fn test_inverse_westward_azimuth_is_negative() {
        let g = Wgs84::new();
        let (azi, _) = g.inverse(0.0, 1.0, 0.0, 0.0);
        assert!((azi + 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_due_north() {
        let g = Wgs84::new();
        let (azi, dist) = g.inverse(35.0, -82.0, 36.0, -82.0);
        assert!(azi.abs() < 1e-6);
        // Meridian degree near 35.5N is about 110.9 km
        assert!((110_800.0..111_000.0).contains(&dist));
    }

    #[test]
    fn test_inverse_same_point() {
        let g = Wgs84::new();
        let (_, dist) = g.inverse(35.5, -82.5, 35.5, -82.5);
        assert!(dist.abs() < 1e-6);
    }

    #[test]
    fn test_inverse_degenerate_is_nan() {
        let g = Wgs84::new();
        assert!(g.inverse(f64::NAN, 0.0, 1.0, 1.0).1.is_nan());
        assert!(g.inverse(0.0, 0.0, 95.0, 1.0).1.is_nan());
        assert!(g.inverse(0.0, f64::INFINITY, 1.0, 1.0).0.is_nan());
    }

    #[test]
    fn test_inverse_antipodal_converges() {
        let g = Wgs84::new();
        let (_, dist) = g.inverse(0.0, 0.0, 0.5, 179.7);
        assert!(dist.is_finite());
        assert!(dist > 19_000_000.0);
    }

    #[test]
    fn test_direct_along_equator() {
        let g = Wgs84::new();
        let (lat, lon) = g.direct(0.0, 0.0, 90.0, EQUATOR_DEGREE_M);
        assert!(lat.abs() < 1e-6);
        assert!((lon - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_direct_inverse_agree() {
        let g = Wgs84::new();
        let (lat, lon) = g.direct(35.5, -82.5, 45.0, 5.0 * METERS_PER_MILE);
        let (azi, dist) = g.inverse(35.5, -82.5, lat, lon);
        assert!((azi - 45.0).abs() < 1e-6);
        assert!((dist - 5.0 * METERS_PER_MILE).abs() < 1e-3);
    }

    #[test]
    fn test_direct_degenerate_is_nan() {
        let g = Wgs84::new();
        let (lat, lon) = g.direct(35.5, -82.5, f64::NAN, 1000.0);
        assert!(lat.is_nan() && lon.is_nan());
    }
}
