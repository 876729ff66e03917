//! Lap and run segmentation from repeated passes near a coordinate.
//!
//! ## Algorithm
//! 1. Mark every sample within the crossing radius of the reference coordinate
//! 2. Group marked indices that are adjacent in the stream into clusters; any
//!    index gap greater than one starts a new cluster
//! 3. Each cluster is one crossing, stamped with its middle sample's timestamp
//!
//! Clustering absorbs GPS jitter and slow rolling near the line, which would
//! otherwise register as a burst of crossings.
//!
//! Circuit laps are consecutive crossing pairs. Point-to-point runs pair start
//! crossings with later finish crossings.

use log::debug;

use crate::rtree::{build_rtree, indices_within_radius};
use crate::{sorted_by_timestamp, CrossingEvent, GpsPoint, Lap, PositionSample, Run};

/// Default crossing radius in meters.
pub const DEFAULT_CROSSING_RADIUS_M: f64 = 20.0;

/// Detect de-duplicated passes within `radius_m` of `target`, in time order.
///
/// # Example
/// ```
/// use lap_delta::{detect_crossings, GpsPoint, PositionSample};
///
/// // Three passes through the origin, one sample each second
/// let samples: Vec<PositionSample> = (0..90)
///     .map(|i| {
///         let offset = ((i % 30) as f64 - 2.0) * 0.0001;
///         PositionSample::new(i as f64 * 1000.0, offset, 0.0)
///     })
///     .collect();
/// let crossings = detect_crossings(&samples, &GpsPoint::new(0.0, 0.0), 20.0);
/// assert_eq!(crossings.len(), 3);
/// ```
pub fn detect_crossings(
    samples: &[PositionSample],
    target: &GpsPoint,
    radius_m: f64,
) -> Vec<CrossingEvent> {
    let samples = sorted_by_timestamp(samples);
    if samples.is_empty() {
        return Vec::new();
    }

    let points: Vec<GpsPoint> = samples.iter().map(|s| s.point()).collect();
    let tree = build_rtree(&points);
    let nearby = indices_within_radius(&tree, &points, target, radius_m);

    let crossings: Vec<CrossingEvent> = cluster_indices(&nearby)
        .into_iter()
        .map(|cluster| {
            let mid = cluster[cluster.len() / 2];
            CrossingEvent {
                timestamp_ms: samples[mid].timestamp_ms,
                sample_index: mid,
                sample_count: cluster.len(),
            }
        })
        .collect();

    debug!(
        "[Crossings] {} samples within {:.0}m -> {} crossings",
        nearby.len(),
        radius_m,
        crossings.len()
    );

    crossings
}

/// Split ascending indices into runs where consecutive indices differ by one.
fn cluster_indices(indices: &[usize]) -> Vec<&[usize]> {
    let mut clusters = Vec::new();
    let mut start = 0;
    for i in 1..=indices.len() {
        if i == indices.len() || indices[i] - indices[i - 1] > 1 {
            if i > start {
                clusters.push(&indices[start..i]);
            }
            start = i;
        }
    }
    clusters
}

/// Turn consecutive crossings into laps.
///
/// The first and last laps (out-lap and in-lap) are left out of the default
/// selection when `exclude_warmup_cooldown` is set; callers may flip
/// [`Lap::included`] on their copy.
pub fn find_laps(crossings: &[CrossingEvent], exclude_warmup_cooldown: bool) -> Vec<Lap> {
    if crossings.len() < 2 {
        return Vec::new();
    }
    let last_index = crossings.len() - 2;

    crossings
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let start_ms = pair[0].timestamp_ms;
            let finish_ms = pair[1].timestamp_ms;
            Lap {
                lap_index: i,
                lap_number: i as u32 + 1,
                start_ms,
                finish_ms,
                duration_s: (finish_ms - start_ms) / 1000.0,
                included: !(exclude_warmup_cooldown && (i == 0 || i == last_index)),
            }
        })
        .collect()
}

/// Laps for a circuit whose line is at `line`.
pub fn detect_laps(
    samples: &[PositionSample],
    line: &GpsPoint,
    radius_m: f64,
    exclude_warmup_cooldown: bool,
) -> Vec<Lap> {
    let crossings = detect_crossings(samples, line, radius_m);
    find_laps(&crossings, exclude_warmup_cooldown)
}

/// Pair start and finish crossings into point-to-point runs.
///
/// Walking the start crossings in time order, each start pairs with the first
/// finish crossing strictly after it that is not before the previous run's
/// finish. When several starts precede that finish, the latest start wins.
/// Unmatched crossings are dropped.
pub fn pair_runs(starts: &[CrossingEvent], finishes: &[CrossingEvent]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut finish_cursor = 0;
    let mut previous_finish = f64::NEG_INFINITY;

    for (i, start) in starts.iter().enumerate() {
        if start.timestamp_ms < previous_finish {
            continue;
        }
        while finish_cursor < finishes.len()
            && finishes[finish_cursor].timestamp_ms <= start.timestamp_ms
        {
            finish_cursor += 1;
        }
        let finish = match finishes.get(finish_cursor) {
            Some(finish) => finish,
            None => break,
        };
        // A later start before this finish supersedes this one
        if starts
            .get(i + 1)
            .is_some_and(|next| next.timestamp_ms < finish.timestamp_ms)
        {
            continue;
        }

        runs.push(Run {
            run_index: runs.len(),
            run_number: runs.len() as u32 + 1,
            start_ms: start.timestamp_ms,
            finish_ms: finish.timestamp_ms,
            duration_s: (finish.timestamp_ms - start.timestamp_ms) / 1000.0,
        });
        previous_finish = finish.timestamp_ms;
        finish_cursor += 1;
    }

    runs
}

/// Runs between separate start and finish coordinates.
///
/// Start and finish crossings are clustered independently with the same
/// proximity rule as laps, then paired by [`pair_runs`].
pub fn detect_runs(
    samples: &[PositionSample],
    start: &GpsPoint,
    finish: &GpsPoint,
    radius_m: f64,
) -> Vec<Run> {
    let starts = detect_crossings(samples, start, radius_m);
    let finishes = detect_crossings(samples, finish, radius_m);
    let runs = pair_runs(&starts, &finishes);
    debug!(
        "[Crossings] {} start / {} finish crossings -> {} runs",
        starts.len(),
        finishes.len(),
        runs.len()
    );
    runs
}
