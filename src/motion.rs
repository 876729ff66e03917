//! Yaw rate from the gyroscope stream.
//!
//! The gyroscope runs at a much higher rate than GPS and its timestamps do not
//! line up with the position samples, so nothing here is co-indexed with the
//! metric series. Pairing across traces is done by nearest race time.

use serde::{Deserialize, Serialize};

use crate::metrics::distance_at_race_time;
use crate::{sorted_by_timestamp, MetricRecord, MotionSample, TimeWindow, YawRateRecord};

/// Convert the vertical-axis rate of every sample in `window` to degrees/second.
///
/// # Example
/// ```
/// use lap_delta::{compute_yaw_rate, MotionSample, TimeWindow};
///
/// let gyro = vec![MotionSample::new(500.0, 0.0, 0.0, std::f64::consts::PI)];
/// let yaw = compute_yaw_rate(&gyro, &TimeWindow::new(0.0, 1000.0).unwrap());
/// assert!((yaw[0].yaw_rate - 180.0).abs() < 1e-9);
/// assert_eq!(yaw[0].race_time, 0.5);
/// ```
pub fn compute_yaw_rate(samples: &[MotionSample], window: &TimeWindow) -> Vec<YawRateRecord> {
    sorted_by_timestamp(samples)
        .iter()
        .filter(|s| window.contains(s.timestamp_ms))
        .map(|s| YawRateRecord {
            timestamp_ms: s.timestamp_ms,
            race_time: window.race_time(s.timestamp_ms),
            yaw_rate: s.z.to_degrees(),
        })
        .collect()
}

/// A reference yaw-rate sample with the comparison value at the nearest race time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YawRatePair {
    pub race_time: f64,
    pub reference: f64,
    pub comparison: f64,
}

/// Pair each reference sample with the comparison sample closest in race time.
///
/// Both series must be in race-time order (as [`compute_yaw_rate`] returns
/// them). Equidistant neighbours resolve to the earlier sample. An empty
/// comparison pairs every sample with 0.0.
pub fn pair_yaw_rates(reference: &[YawRateRecord], comparison: &[YawRateRecord]) -> Vec<YawRatePair> {
    let mut cursor = 0;
    reference
        .iter()
        .map(|r| {
            let comparison = if comparison.is_empty() {
                0.0
            } else {
                loop {
                    let current = comparison[cursor].race_time;
                    // Step over samples sharing the current race time
                    let next = comparison[cursor..]
                        .iter()
                        .position(|c| c.race_time != current)
                        .map(|k| cursor + k);
                    match next {
                        Some(j)
                            if (comparison[j].race_time - r.race_time).abs()
                                < (current - r.race_time).abs() =>
                        {
                            cursor = j
                        }
                        _ => break,
                    }
                }
                comparison[cursor].yaw_rate
            };
            YawRatePair {
                race_time: r.race_time,
                reference: r.yaw_rate,
                comparison,
            }
        })
        .collect()
}

/// A yaw-rate chart point placed on the reference distance axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YawChartPoint {
    pub race_time: f64,
    /// Reference cumulative distance at `race_time` (meters)
    pub distance: f64,
    pub reference: f64,
    pub comparison: f64,
}

/// Pair both yaw-rate series by race time and key them on reference distance.
pub fn yaw_rate_chart(
    reference: &[YawRateRecord],
    comparison: &[YawRateRecord],
    reference_metrics: &[MetricRecord],
) -> Vec<YawChartPoint> {
    pair_yaw_rates(reference, comparison)
        .into_iter()
        .map(|p| YawChartPoint {
            race_time: p.race_time,
            distance: distance_at_race_time(reference_metrics, p.race_time),
            reference: p.reference,
            comparison: p.comparison,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaw(race_time: f64, yaw_rate: f64) -> YawRateRecord {
        YawRateRecord {
            timestamp_ms: race_time * 1000.0,
            race_time,
            yaw_rate,
        }
    }

    #[test]
    fn test_yaw_rate_window_and_sign() {
        let samples = vec![
            MotionSample::new(0.0, 0.0, 0.0, 1.0),
            MotionSample::new(2000.0, 0.5, 0.5, -0.5),
            MotionSample::new(1000.0, 0.0, 0.0, 0.25),
            MotionSample::new(5000.0, 0.0, 0.0, 1.0),
        ];
        let window = TimeWindow::new(1000.0, 3000.0).unwrap();
        let rates = compute_yaw_rate(&samples, &window);

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].race_time, 0.0);
        assert!((rates[0].yaw_rate - 0.25_f64.to_degrees()).abs() < 1e-12);
        assert_eq!(rates[1].race_time, 1.0);
        assert!(rates[1].yaw_rate < 0.0);
    }

    #[test]
    fn test_pairing_picks_nearest() {
        let reference = vec![yaw(0.0, 1.0), yaw(1.0, 2.0), yaw(2.0, 3.0), yaw(9.0, 4.0)];
        let comparison = vec![yaw(0.1, 10.0), yaw(0.9, 20.0), yaw(2.6, 30.0), yaw(3.0, 40.0)];
        let pairs = pair_yaw_rates(&reference, &comparison);

        assert_eq!(pairs.len(), reference.len());
        assert_eq!(pairs[0].comparison, 10.0);
        assert_eq!(pairs[1].comparison, 20.0);
        assert_eq!(pairs[2].comparison, 30.0);
        assert_eq!(pairs[3].comparison, 40.0);
        assert_eq!(pairs[3].reference, 4.0);
    }

    #[test]
    fn test_pairing_tie_prefers_earlier() {
        let reference = vec![yaw(1.0, 0.0)];
        let comparison = vec![yaw(0.5, 5.0), yaw(1.5, 6.0)];
        assert_eq!(pair_yaw_rates(&reference, &comparison)[0].comparison, 5.0);
    }

    #[test]
    fn test_pairing_steps_over_duplicate_times() {
        let reference = vec![yaw(2.0, 0.0)];
        let comparison = vec![yaw(0.0, 1.0), yaw(0.0, 2.0), yaw(2.0, 3.0)];
        assert_eq!(pair_yaw_rates(&reference, &comparison)[0].comparison, 3.0);
    }

    #[test]
    fn test_yaw_chart_uses_reference_distance() {
        let metrics: Vec<MetricRecord> = (0..5)
            .map(|i| MetricRecord {
                timestamp_ms: i as f64 * 1000.0,
                race_time: i as f64,
                latitude: 0.0,
                longitude: 0.0,
                speed: 10.0,
                speed_mph: 0.0,
                distance: i as f64 * 10.0,
            })
            .collect();
        let reference = vec![yaw(0.5, 1.0), yaw(2.0, 2.0), yaw(7.0, 3.0)];
        let comparison = vec![yaw(0.4, -1.0), yaw(2.1, -2.0)];
        let chart = yaw_rate_chart(&reference, &comparison, &metrics);

        assert_eq!(chart.len(), 3);
        assert!((chart[0].distance - 5.0).abs() < 1e-9);
        assert_eq!(chart[0].comparison, -1.0);
        assert_eq!(chart[1].distance, 20.0);
        assert_eq!(chart[1].comparison, -2.0);
        // Past the last metric record the distance holds at the total
        assert_eq!(chart[2].distance, 40.0);
        assert_eq!(chart[2].reference, 3.0);
    }

    #[test]
    fn test_pairing_empty_comparison() {
        let pairs = pair_yaw_rates(&[yaw(0.0, 1.0)], &[]);
        assert_eq!(pairs[0].comparison, 0.0);
    }
}
