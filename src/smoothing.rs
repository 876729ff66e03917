//! Derived signals: smoothed acceleration and the closing/opening rate.

use crate::{MetricRecord, TimeDeltaRecord};

/// Centered moving average with `half_window` samples on each side.
///
/// The window shrinks at the boundaries rather than padding.
pub fn moving_average(values: &[f64], half_window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(half_window);
            let hi = (i + half_window).min(values.len() - 1);
            let window = &values[lo..=hi];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

/// Longitudinal acceleration in m/s² per metric record, smoothed.
///
/// Forward finite difference of speed over race time; differences over less
/// than `min_dt_s` count as zero and the last sample repeats the one before
/// it. The result is aligned with `metrics` and empty if it has fewer than two
/// records.
///
/// # Example
/// ```
/// use lap_delta::{compute_acceleration, compute_metrics, PositionSample, TimeWindow};
///
/// let samples: Vec<PositionSample> = (0..10)
///     .map(|i| PositionSample::new(i as f64 * 1000.0, 0.0, 0.0).with_speed(Some(2.0 * i as f64 + 1.0), None))
///     .collect();
/// let metrics = compute_metrics(&samples, &TimeWindow::new(0.0, 9000.0).unwrap());
/// let accel = compute_acceleration(&metrics, 2, 0.01);
/// assert!(accel.iter().all(|a| (a - 2.0).abs() < 1e-9));
/// ```
pub fn compute_acceleration(metrics: &[MetricRecord], half_window: usize, min_dt_s: f64) -> Vec<f64> {
    if metrics.len() < 2 {
        return Vec::new();
    }

    let mut raw: Vec<f64> = metrics
        .windows(2)
        .map(|w| {
            let dt = w[1].race_time - w[0].race_time;
            if dt > min_dt_s {
                (w[1].speed - w[0].speed) / dt
            } else {
                0.0
            }
        })
        .collect();
    raw.push(raw[raw.len() - 1]);

    moving_average(&raw, half_window)
}

/// Rate at which the delta is changing, in seconds gained or lost per second.
///
/// For each record, compares against the most recent earlier record at least
/// `window_s` before it (or the first record if none is that old). Spans of
/// `min_dt_s` or less yield 0. Positive means the reference is losing time.
pub fn compute_closing_rate(deltas: &[TimeDeltaRecord], window_s: f64, min_dt_s: f64) -> Vec<f64> {
    let mut j = 0;
    deltas
        .iter()
        .enumerate()
        .map(|(i, d)| {
            // j only ever moves forward because race time is non-decreasing
            while j < i && d.race_time - deltas[j + 1].race_time >= window_s {
                j += 1;
            }
            let dt = d.race_time - deltas[j].race_time;
            if dt > min_dt_s {
                (d.delta - deltas[j].delta) / dt
            } else {
                0.0
            }
        })
        .collect()
}
