//! Locate the reference window's start and finish inside the comparison trace.

use log::{debug, warn};

use crate::geo_utils::haversine_distance;
use crate::{sorted_by_timestamp, CompBounds, GpsPoint, MetricRecord, PositionSample};

/// Find the comparison samples closest to the reference start and finish.
///
/// The start is the global nearest sample (first one wins on ties). The finish
/// is searched only *after* the start index, so a pass near the finish made
/// while still approaching the start cannot be picked. If no sample follows
/// the start, the finish falls back to the last sample.
///
/// Indices refer to the comparison stream in time order. Returns `None` for an
/// empty stream.
///
/// # Example
/// ```
/// use lap_delta::{find_comp_bounds, GpsPoint, PositionSample};
///
/// let comp: Vec<PositionSample> = (0..10)
///     .map(|i| PositionSample::new(i as f64 * 1000.0, i as f64 * 0.0001, 0.0))
///     .collect();
/// let bounds = find_comp_bounds(&comp, &GpsPoint::new(0.0002, 0.0), &GpsPoint::new(0.0007, 0.0))
///     .unwrap();
/// assert_eq!((bounds.start_index, bounds.finish_index), (2, 7));
/// assert_eq!(bounds.start_ms, 2000.0);
/// ```
pub fn find_comp_bounds(
    comparison: &[PositionSample],
    start: &GpsPoint,
    finish: &GpsPoint,
) -> Option<CompBounds> {
    let samples = sorted_by_timestamp(comparison);
    let last_index = samples.len().checked_sub(1)?;

    let (start_index, start_dist) = nearest_sample(&samples, start, 0)?;
    let (finish_index, finish_dist) = match nearest_sample(&samples, finish, start_index + 1) {
        Some(found) => found,
        None => {
            warn!("[Bounds] No comparison samples after start index {}, using last sample", start_index);
            (last_index, haversine_distance(&samples[last_index].point(), finish))
        }
    };

    debug!(
        "[Bounds] start #{} ({:.1}m off), finish #{} ({:.1}m off)",
        start_index, start_dist, finish_index, finish_dist
    );

    Some(CompBounds {
        start_index,
        finish_index,
        start_ms: samples[start_index].timestamp_ms,
        finish_ms: samples[finish_index].timestamp_ms,
    })
}

/// Bounds from a reference metric series: its first and last positions.
pub fn find_comp_bounds_for(
    comparison: &[PositionSample],
    reference: &[MetricRecord],
) -> Option<CompBounds> {
    let start = reference.first()?.point();
    let finish = reference.last()?.point();
    find_comp_bounds(comparison, &start, &finish)
}

/// Index and distance of the sample nearest `target`, scanning from `from`.
/// Strict comparison keeps the first of equally distant samples.
fn nearest_sample(samples: &[PositionSample], target: &GpsPoint, from: usize) -> Option<(usize, f64)> {
    samples
        .iter()
        .enumerate()
        .skip(from)
        .map(|(i, s)| (i, haversine_distance(&s.point(), target)))
        .fold(None, |best, (i, d)| match best {
            _ if d.is_nan() => best,
            Some((_, best_d)) if d >= best_d => best,
            _ => Some((i, d)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: usize, lat: f64, lng: f64) -> PositionSample {
        PositionSample::new(i as f64 * 1000.0, lat, lng)
    }

    #[test]
    fn test_finish_searched_after_start() {
        // Drives past the finish on the way to the start, then does the course
        let finish = GpsPoint::new(0.001, 0.001);
        let start = GpsPoint::new(0.0, 0.0);
        let comp = vec![
            sample(0, 0.001, 0.001), // exactly at finish, before start
            sample(1, 0.0005, 0.0005),
            sample(2, 0.0, 0.0), // start
            sample(3, 0.0005, 0.0),
            sample(4, 0.00099, 0.001), // finish pass
            sample(5, 0.002, 0.002),
        ];
        let bounds = find_comp_bounds(&comp, &start, &finish).unwrap();
        assert_eq!(bounds.start_index, 2);
        assert_eq!(bounds.finish_index, 4);
        assert!(bounds.finish_index > bounds.start_index);
        assert_eq!(bounds.finish_ms, 4000.0);
    }

    #[test]
    fn test_start_tie_breaks_to_first() {
        let start = GpsPoint::new(0.0, 0.0);
        let comp = vec![
            sample(0, 0.0001, 0.0),
            sample(1, 0.0, 0.0),
            sample(2, 0.0, 0.0),
            sample(3, 0.001, 0.0),
        ];
        let bounds = find_comp_bounds(&comp, &start, &GpsPoint::new(0.001, 0.0)).unwrap();
        assert_eq!(bounds.start_index, 1);
        assert_eq!(bounds.finish_index, 3);
    }

    #[test]
    fn test_start_at_last_sample_falls_back() {
        let comp = vec![sample(0, 0.001, 0.0), sample(1, 0.0, 0.0)];
        let bounds =
            find_comp_bounds(&comp, &GpsPoint::new(0.0, 0.0), &GpsPoint::new(0.001, 0.0)).unwrap();
        assert_eq!(bounds.start_index, 1);
        assert_eq!(bounds.finish_index, 1);
        assert!(bounds.window().is_none());
    }

    #[test]
    fn test_empty_comparison() {
        assert!(find_comp_bounds(&[], &GpsPoint::new(0.0, 0.0), &GpsPoint::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn test_unsorted_comparison_indexes_time_order() {
        let comp = vec![sample(2, 0.0002, 0.0), sample(0, 0.0, 0.0), sample(1, 0.0001, 0.0)];
        let bounds =
            find_comp_bounds(&comp, &GpsPoint::new(0.0, 0.0), &GpsPoint::new(0.0002, 0.0)).unwrap();
        assert_eq!(bounds.start_index, 0);
        assert_eq!(bounds.finish_index, 2);
        assert_eq!(bounds.finish_ms, 2000.0);
    }
}
