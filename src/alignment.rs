//! Distance-keyed time delta between two metric series.
//!
//! Two subjects at different speeds are never at the same place at the same
//! moment, so the traces are merged on cumulative path distance, not on
//! elapsed time. For each reference sample the comparison's race time at the
//! same distance is interpolated and the delta is the difference.
//!
//! The merge is a forward-only two-pointer walk: the comparison cursor never
//! moves backward, giving O(n + m) over both series.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{MetricRecord, TimeDeltaRecord};

/// Compute one [`TimeDeltaRecord`] per reference record.
///
/// `delta = reference race time - comparison race time` at the same distance;
/// positive means the reference is slower at that point. Reference distances
/// beyond the comparison's total are clamped to the comparison's final record.
///
/// Returns an empty series when either input is empty.
pub fn compute_time_delta(
    reference: &[MetricRecord],
    comparison: &[MetricRecord],
) -> Vec<TimeDeltaRecord> {
    let last = match comparison.last() {
        Some(last) if !reference.is_empty() => last,
        _ => return Vec::new(),
    };
    let comp_total = last.distance;

    let mut cursor = 0;
    let mut clamped = 0usize;

    let deltas: Vec<TimeDeltaRecord> = reference
        .iter()
        .map(|r| {
            let d = r.distance;

            let (comp_race_time, comp_timestamp) = if d > comp_total {
                clamped += 1;
                (last.race_time, last.timestamp_ms)
            } else {
                // Last comparison index whose distance does not exceed d
                while cursor + 1 < comparison.len() && comparison[cursor + 1].distance <= d {
                    cursor += 1;
                }
                let c0 = &comparison[cursor];
                let c1 = &comparison[(cursor + 1).min(comparison.len() - 1)];
                let seg_len = c1.distance - c0.distance;
                let t = if seg_len > 0.0 {
                    (d - c0.distance) / seg_len
                } else {
                    0.0
                };
                (
                    c0.race_time + t * (c1.race_time - c0.race_time),
                    c0.timestamp_ms + t * (c1.timestamp_ms - c0.timestamp_ms),
                )
            };

            TimeDeltaRecord {
                race_time: r.race_time,
                timestamp_ms: r.timestamp_ms,
                distance: d,
                comparison_race_time: comp_race_time,
                comparison_timestamp_ms: comp_timestamp,
                delta: r.race_time - comp_race_time,
                latitude: r.latitude,
                longitude: r.longitude,
            }
        })
        .collect();

    if clamped > 0 {
        debug!(
            "[Aligner] {} of {} records beyond comparison distance {:.1}m, clamped",
            clamped,
            deltas.len(),
            comp_total
        );
    }

    deltas
}

/// Positions to seek both recordings to for one point on the course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekPoint {
    /// The delta record the request resolved to
    pub record: TimeDeltaRecord,
    /// Seconds into the reference recording
    pub reference_s: f64,
    /// Seconds into the comparison recording
    pub comparison_s: f64,
}

/// Resolve a reference race time to seek positions in both recordings.
///
/// Picks the delta record nearest in race time (earliest on ties). Each seek
/// position is in its own recording's timestamp space.
pub fn seek_point(deltas: &[TimeDeltaRecord], race_time: f64) -> Option<SeekPoint> {
    let record = deltas.iter().fold(None::<&TimeDeltaRecord>, |best, d| match best {
        Some(b) if (b.race_time - race_time).abs() <= (d.race_time - race_time).abs() => Some(b),
        _ => Some(d),
    })?;

    Some(SeekPoint {
        record: *record,
        reference_s: record.timestamp_ms / 1000.0,
        comparison_s: record.comparison_timestamp_ms / 1000.0,
    })
}
