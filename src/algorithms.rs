//! # Algorithm Toolbox
//!
//! Direct access to every stage of the pipeline, for callers that want to
//! drive the stages themselves instead of going through
//! [`AnalysisEngine`](crate::AnalysisEngine).
//!
//! ## Core Algorithms
//!
//! - **Metrics**: speed and trapezoidal path distance per sample
//! - **Bounds**: start/finish location in the comparison trace
//! - **Alignment**: distance-keyed time delta
//! - **Crossings**: lap and run segmentation
//! - **Smoothing**: acceleration and closing rate
//!
//! ## Chart Helpers
//!
//! - **Course simplification**: Douglas-Peucker over the delta series' positions
//! - **Decimation**: fixed-stride thinning for chart series
//!
//! # Example
//!
//! ```rust
//! use lap_delta::algorithms::{haversine_distance, bearing, GpsPoint};
//!
//! let start = GpsPoint::new(51.5074, -0.1278);
//! let finish = GpsPoint::new(51.5080, -0.1278);
//! assert!((haversine_distance(&start, &finish) - 66.7).abs() < 0.5);
//! assert_eq!(bearing(&start, &finish), 0.0);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{
    AlignConfig, CompBounds, CrossingEvent, GpsPoint, Lap, MetricRecord, MotionSample,
    PositionSample, Run, TimeDeltaRecord, TimeWindow, YawRateRecord,
};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{bearing, haversine_distance, meters_to_degrees, polyline_length};

// =============================================================================
// Pipeline Stages
// =============================================================================

pub use crate::alignment::{compute_time_delta, seek_point};
pub use crate::bounds::{find_comp_bounds, find_comp_bounds_for};
pub use crate::crossings::{detect_crossings, detect_laps, detect_runs, find_laps, pair_runs};
pub use crate::metrics::{
    compute_metrics, compute_metrics_with_source, distance_at_race_time, max_speed,
    speed_at_race_time,
};
pub use crate::motion::{compute_yaw_rate, pair_yaw_rates, yaw_rate_chart};
pub use crate::smoothing::{compute_acceleration, compute_closing_rate, moving_average};

// =============================================================================
// Chart Helpers
// =============================================================================

/// Douglas-Peucker simplification of the course traced by a delta series.
///
/// Returns the indices of the retained records so per-point values (delta,
/// closing rate) can be looked up alongside the simplified geometry. The first
/// and last records are always kept.
///
/// # Example
/// ```rust
/// use lap_delta::algorithms::simplify_course;
/// use lap_delta::TimeDeltaRecord;
///
/// let straight: Vec<TimeDeltaRecord> = (0..50)
///     .map(|i| TimeDeltaRecord {
///         race_time: i as f64,
///         timestamp_ms: i as f64 * 1000.0,
///         distance: i as f64 * 10.0,
///         comparison_race_time: i as f64,
///         comparison_timestamp_ms: i as f64 * 1000.0,
///         delta: 0.0,
///         latitude: i as f64 * 0.0001,
///         longitude: 0.0,
///     })
///     .collect();
/// assert_eq!(simplify_course(&straight, 0.00002), vec![0, 49]);
/// ```
pub fn simplify_course(deltas: &[TimeDeltaRecord], tolerance_deg: f64) -> Vec<usize> {
    use geo::{algorithm::simplify::SimplifyIdx, Coord, LineString};

    if deltas.len() < 3 {
        return (0..deltas.len()).collect();
    }

    let coords: Vec<Coord<f64>> = deltas
        .iter()
        .map(|d| Coord {
            x: d.longitude,
            y: d.latitude,
        })
        .collect();

    LineString::new(coords).simplify_idx(&tolerance_deg)
}

/// Thin a series to at most `max_points` by taking every n-th element.
///
/// The stride is `len / max_points` rounded up (at least 1), so short series
/// pass through unchanged.
pub fn decimate<T: Clone>(series: &[T], max_points: usize) -> Vec<T> {
    let step = series.len().div_ceil(max_points.max(1)).max(1);
    series.iter().step_by(step).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lng: f64, i: usize) -> TimeDeltaRecord {
        TimeDeltaRecord {
            race_time: i as f64,
            timestamp_ms: i as f64 * 1000.0,
            distance: 0.0,
            comparison_race_time: 0.0,
            comparison_timestamp_ms: 0.0,
            delta: 0.0,
            latitude: lat,
            longitude: lng,
        }
    }

    #[test]
    fn test_simplify_keeps_corner() {
        // North then east: an L-shaped course
        let mut course: Vec<TimeDeltaRecord> = (0..10).map(|i| at(i as f64 * 0.0001, 0.0, i)).collect();
        course.extend((1..10).map(|i| at(0.0009, i as f64 * 0.0001, 9 + i)));

        let kept = simplify_course(&course, 0.00002);
        assert_eq!(kept, vec![0, 9, 18]);
    }

    #[test]
    fn test_simplify_short_series() {
        let course = vec![at(0.0, 0.0, 0), at(0.001, 0.0, 1)];
        assert_eq!(simplify_course(&course, 0.00002), vec![0, 1]);
        assert!(simplify_course(&[], 0.00002).is_empty());
    }

    #[test]
    fn test_decimate() {
        let series: Vec<usize> = (0..1200).collect();
        let thinned = decimate(&series, 500);
        // Stride 3
        assert_eq!(thinned.len(), 400);
        assert_eq!(thinned[1], 3);

        // Just under twice the limit still has to be thinned
        let series: Vec<usize> = (0..999).collect();
        let thinned = decimate(&series, 500);
        assert!(thinned.len() <= 500);
        assert_eq!(thinned.len(), 500);

        for len in [1, 499, 500, 501, 1000, 1001, 4321] {
            let series: Vec<usize> = (0..len).collect();
            assert!(decimate(&series, 500).len() <= 500, "len {}", len);
        }

        let short: Vec<usize> = (0..10).collect();
        assert_eq!(decimate(&short, 500), short);
        assert!(decimate::<usize>(&[], 500).is_empty());
    }
}
