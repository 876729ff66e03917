//! Speed and cumulative distance for one trace inside a time window.
//!
//! Two passes: speed per sample first, then trapezoidal integration of those
//! speeds into path distance. Integrating speed rather than summing
//! point-to-point hops keeps single-sample position noise out of the
//! distance axis the aligner keys on.

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::{sorted_by_timestamp, MetricRecord, PositionSample, SpeedSource, TimeWindow, MPS_TO_MPH};

/// Build the metric series for the samples inside `window` (inclusive).
///
/// Uses instrument 2D speed when present and nonzero. See
/// [`compute_metrics_with_source`] to choose another source.
///
/// Returns an empty series when fewer than two samples fall in the window.
///
/// # Example
/// ```
/// use lap_delta::{compute_metrics, PositionSample, TimeWindow};
///
/// let samples = vec![
///     PositionSample::new(0.0, 0.0, 0.0),
///     PositionSample::new(1000.0, 0.0001, 0.0),
///     PositionSample::new(2000.0, 0.0002, 0.0),
/// ];
/// let metrics = compute_metrics(&samples, &TimeWindow::new(0.0, 2000.0).unwrap());
/// assert_eq!(metrics.len(), 3);
/// assert!((metrics[2].distance - 22.24).abs() < 0.1);
/// ```
pub fn compute_metrics(samples: &[PositionSample], window: &TimeWindow) -> Vec<MetricRecord> {
    compute_metrics_with_source(samples, window, SpeedSource::TwoD)
}

/// Build the metric series preferring the given instrument speed.
pub fn compute_metrics_with_source(
    samples: &[PositionSample],
    window: &TimeWindow,
    source: SpeedSource,
) -> Vec<MetricRecord> {
    let sorted = sorted_by_timestamp(samples);
    let in_window: Vec<&PositionSample> = sorted
        .iter()
        .filter(|s| window.contains(s.timestamp_ms))
        .collect();

    if in_window.len() < 2 {
        debug!(
            "[Metrics] {} samples in window {:.0}..{:.0}ms, need 2",
            in_window.len(),
            window.start_ms,
            window.finish_ms
        );
        return Vec::new();
    }

    let speeds = sample_speeds(&in_window, source);

    let mut records = Vec::with_capacity(in_window.len());
    let mut distance = 0.0;
    for (i, sample) in in_window.iter().enumerate() {
        if i > 0 {
            let dt = (sample.timestamp_ms - in_window[i - 1].timestamp_ms) / 1000.0;
            distance += (speeds[i - 1] + speeds[i]) / 2.0 * dt;
        }
        records.push(MetricRecord {
            timestamp_ms: sample.timestamp_ms,
            race_time: window.race_time(sample.timestamp_ms),
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed: speeds[i],
            speed_mph: speeds[i] * MPS_TO_MPH,
            distance,
        });
    }

    debug!(
        "[Metrics] {} samples, {:.1}m over {:.2}s",
        records.len(),
        distance,
        records.last().map(|r| r.race_time).unwrap_or(0.0)
    );

    records
}

/// Speed per sample in m/s. Always non-negative.
fn sample_speeds(samples: &[&PositionSample], source: SpeedSource) -> Vec<f64> {
    (0..samples.len())
        .map(|i| {
            if let Some(speed) = samples[i].instrument_speed(source) {
                return speed.abs();
            }
            // The first sample has no predecessor, so look forward instead
            let (from, to) = if i == 0 {
                (samples[0], samples[1])
            } else {
                (samples[i - 1], samples[i])
            };
            positional_speed(from, to)
        })
        .collect()
}

/// Haversine distance over elapsed time; zero when no time elapsed.
fn positional_speed(from: &PositionSample, to: &PositionSample) -> f64 {
    let dt = (to.timestamp_ms - from.timestamp_ms) / 1000.0;
    if dt <= 0.0 {
        return 0.0;
    }
    haversine_distance(&from.point(), &to.point()) / dt
}

/// Cumulative distance at an arbitrary race time, linearly interpolated.
///
/// Times before the first record clamp to its distance, times after the last
/// clamp to the total. An empty series has distance 0, and a non-finite time
/// resolves to the first record.
pub fn distance_at_race_time(metrics: &[MetricRecord], race_time: f64) -> f64 {
    value_at_race_time(metrics, race_time, |m| m.distance)
}

/// Speed in m/s at an arbitrary race time, linearly interpolated.
///
/// Clamps the same way as [`distance_at_race_time`].
pub fn speed_at_race_time(metrics: &[MetricRecord], race_time: f64) -> f64 {
    value_at_race_time(metrics, race_time, |m| m.speed)
}

/// Highest speed in the series in m/s, 0 when empty.
pub fn max_speed(metrics: &[MetricRecord]) -> f64 {
    metrics.iter().map(|m| m.speed).fold(0.0, f64::max)
}

fn value_at_race_time(
    metrics: &[MetricRecord],
    race_time: f64,
    value: impl Fn(&MetricRecord) -> f64,
) -> f64 {
    let (first, last) = match (metrics.first(), metrics.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0.0,
    };
    if !race_time.is_finite() || race_time <= first.race_time {
        return value(first);
    }
    if race_time >= last.race_time {
        return value(last);
    }

    // First record at or after the requested time
    let i = metrics.partition_point(|m| m.race_time < race_time);
    let m0 = &metrics[i - 1];
    let m1 = &metrics[i];
    let span = m1.race_time - m0.race_time;
    if span <= 0.0 {
        return value(m1);
    }
    let t = (race_time - m0.race_time) / span;
    value(m0) + t * (value(m1) - value(m0))
}
