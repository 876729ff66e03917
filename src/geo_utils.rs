//! Geographic utilities on a spherical Earth.

use crate::GpsPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (approximate, for envelope queries only).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// # Example
/// ```
/// use lap_delta::{GpsPoint, haversine_distance};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
/// let km = haversine_distance(&london, &paris) / 1000.0;
/// assert!((km - 343.5).abs() < 1.0);
/// ```
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push `a` fractionally past 1 for antipodal points
    let a = a.clamp(0.0, 1.0);
    EARTH_RADIUS_M * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial bearing from `p1` to `p2` in degrees, normalized to [0, 360).
///
/// Identical points have no direction; they return 0.0.
pub fn bearing(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let y = dlng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlng.cos();
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }

    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Total path length of a polyline in meters.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert a distance in meters to (latitude, longitude) degree spans at a latitude.
///
/// Longitude span grows toward the poles; it is capped at 180 degrees.
pub fn meters_to_degrees(meters: f64, ref_lat: f64) -> (f64, f64) {
    let lat_deg = meters / METERS_PER_DEGREE;
    let cos_lat = ref_lat.to_radians().cos().abs();
    let lng_deg = if cos_lat < 1e-6 {
        180.0
    } else {
        (meters / (METERS_PER_DEGREE * cos_lat)).min(180.0)
    };
    (lat_deg, lng_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_small_step() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(0.0001, 0.0);
        let d = haversine_distance(&a, &b);
        assert!((d - 11.12).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_haversine_identical_points() {
        let a = GpsPoint::new(45.0, 7.0);
        assert_eq!(haversine_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GpsPoint::new(0.0, 0.0);
        assert!((bearing(&origin, &GpsPoint::new(1.0, 0.0)) - 0.0).abs() < 1e-9);
        assert!((bearing(&origin, &GpsPoint::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing(&origin, &GpsPoint::new(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((bearing(&origin, &GpsPoint::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_identical_points_is_finite() {
        let a = GpsPoint::new(51.5, -0.12);
        let b = bearing(&a, &a);
        assert!(b.is_finite());
        assert!((0.0..360.0).contains(&b));
    }

    #[test]
    fn test_polyline_length() {
        let points: Vec<GpsPoint> = (0..3).map(|i| GpsPoint::new(i as f64 * 0.0001, 0.0)).collect();
        assert!((polyline_length(&points) - 22.24).abs() < 0.01);
        assert_eq!(polyline_length(&points[..1]), 0.0);
    }

    #[test]
    fn test_meters_to_degrees_widens_with_latitude() {
        let (lat_eq, lng_eq) = meters_to_degrees(100.0, 0.0);
        let (lat_60, lng_60) = meters_to_degrees(100.0, 60.0);
        assert_eq!(lat_eq, lat_60);
        assert!((lng_60 - 2.0 * lng_eq).abs() < 1e-6);
        assert_eq!(meters_to_degrees(100.0, 90.0).1, 180.0);
    }
}
