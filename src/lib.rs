//! # Lap Delta
//!
//! Distance-keyed comparison of two GPS/IMU telemetry traces recorded on the
//! same course.
//!
//! This library provides:
//! - Per-trace speed, cumulative distance and yaw-rate series for a time window
//! - Start/finish location of the reference window inside the comparison trace
//! - Time delta between the traces at every point along the course
//! - Lap (circuit) and run (point-to-point) segmentation by proximity clustering
//! - Smoothed acceleration and a windowed closing/opening rate
//!
//! ## Features
//!
//! - **`parallel`** - Build both traces' series concurrently with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use lap_delta::{compute_metrics, compute_time_delta, PositionSample, TimeWindow};
//!
//! let reference: Vec<PositionSample> = (0..20)
//!     .map(|i| PositionSample::new(i as f64 * 1000.0, i as f64 * 0.0001, 0.0))
//!     .collect();
//! let comparison: Vec<PositionSample> = (0..25)
//!     .map(|i| PositionSample::new(i as f64 * 1000.0, i as f64 * 0.00008, 0.0))
//!     .collect();
//!
//! let window = TimeWindow::new(0.0, 19_000.0).unwrap();
//! let ref_metrics = compute_metrics(&reference, &window);
//! let comp_metrics = compute_metrics(&comparison, &TimeWindow::new(0.0, 24_000.0).unwrap());
//!
//! let deltas = compute_time_delta(&ref_metrics, &comp_metrics);
//! assert_eq!(deltas.len(), ref_metrics.len());
//! // The reference is faster, so it reaches every point earlier
//! assert!(deltas.last().unwrap().delta < 0.0);
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{LapDeltaError, OptionExt, Result, TraceRole};

// Geographic utilities (haversine, bearing, degree conversions)
pub mod geo_utils;
pub use geo_utils::{bearing, haversine_distance};

// R-tree over sample positions for radius queries
pub mod rtree;

// Speed and cumulative distance per position sample
pub mod metrics;
pub use metrics::{compute_metrics, distance_at_race_time, max_speed, speed_at_race_time};

// Yaw rate from the gyroscope stream
pub mod motion;
pub use motion::{compute_yaw_rate, pair_yaw_rates, yaw_rate_chart, YawChartPoint, YawRatePair};

// Start/finish location inside the comparison trace
pub mod bounds;
pub use bounds::{find_comp_bounds, find_comp_bounds_for};

// Distance-keyed time delta
pub mod alignment;
pub use alignment::{compute_time_delta, seek_point, SeekPoint};

// Lap and run segmentation
pub mod crossings;
pub use crossings::{detect_crossings, detect_runs, find_laps};

// Acceleration and closing-rate signals
pub mod smoothing;
pub use smoothing::{compute_acceleration, compute_closing_rate, moving_average};

// Algorithm toolbox and chart helpers
pub mod algorithms;

// Analysis context and full pipeline
pub mod engine;
pub use engine::{Analysis, AnalysisEngine, CoursePoint, Trace};

/// Meters per second to miles per hour.
pub const MPS_TO_MPH: f64 = 2.23694;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use lap_delta::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// A raw GPS sample as delivered by the telemetry extractor.
///
/// Arrival order is not guaranteed to be time order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Milliseconds since the trace's own recording start
    pub timestamp_ms: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Instrument-reported ground speed in m/s
    pub speed_2d: Option<f64>,
    /// Instrument-reported 3D speed in m/s
    pub speed_3d: Option<f64>,
}

impl PositionSample {
    /// Create a sample without instrument speed.
    pub fn new(timestamp_ms: f64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp_ms,
            latitude,
            longitude,
            speed_2d: None,
            speed_3d: None,
        }
    }

    /// Attach instrument-reported speeds.
    pub fn with_speed(mut self, speed_2d: Option<f64>, speed_3d: Option<f64>) -> Self {
        self.speed_2d = speed_2d;
        self.speed_3d = speed_3d;
        self
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Instrument speed for the given source, if present, finite and nonzero.
    pub fn instrument_speed(&self, source: SpeedSource) -> Option<f64> {
        let speed = match source {
            SpeedSource::TwoD => self.speed_2d,
            SpeedSource::ThreeD => self.speed_3d,
            SpeedSource::Derived => None,
        }?;
        (speed.is_finite() && speed != 0.0).then_some(speed)
    }
}

/// A gyroscope sample. Angular rates are in radians/second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub timestamp_ms: f64,
    pub x: f64,
    pub y: f64,
    /// Vertical axis
    pub z: f64,
}

impl MotionSample {
    pub fn new(timestamp_ms: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            z,
        }
    }
}

/// Samples that carry a trace-relative timestamp.
pub trait Timestamped {
    fn timestamp_ms(&self) -> f64;
}

impl Timestamped for PositionSample {
    fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }
}

impl Timestamped for MotionSample {
    fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }
}

/// A start/finish pair in one trace's timestamp space (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: f64,
    pub finish_ms: f64,
}

impl TimeWindow {
    /// Create a window. The finish must be strictly after the start.
    pub fn new(start_ms: f64, finish_ms: f64) -> Result<Self> {
        if !(start_ms.is_finite() && finish_ms.is_finite()) || finish_ms <= start_ms {
            return Err(LapDeltaError::InvalidWindow {
                start_ms,
                finish_ms,
            });
        }
        Ok(Self {
            start_ms,
            finish_ms,
        })
    }

    /// Window from video positions in seconds.
    pub fn from_seconds(start_s: f64, finish_s: f64) -> Result<Self> {
        Self::new(start_s * 1000.0, finish_s * 1000.0)
    }

    pub fn contains(&self, timestamp_ms: f64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms <= self.finish_ms
    }

    /// Seconds since window start for a timestamp.
    pub fn race_time(&self, timestamp_ms: f64) -> f64 {
        (timestamp_ms - self.start_ms) / 1000.0
    }

    pub fn duration_s(&self) -> f64 {
        (self.finish_ms - self.start_ms) / 1000.0
    }
}

/// Which speed to trust for a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpeedSource {
    /// Instrument ground speed, falling back to positional derivation
    #[default]
    TwoD,
    /// Instrument 3D speed, falling back to positional derivation
    ThreeD,
    /// Always derive from consecutive positions
    Derived,
}

/// How the course is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseMode {
    /// Repeated laps through a single start/finish line
    Circuit,
    /// Separate start and finish locations
    PointToPoint,
}

/// Per-sample derived record for one trace inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp_ms: f64,
    /// Seconds since window start
    pub race_time: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Speed in m/s
    pub speed: f64,
    pub speed_mph: f64,
    /// Meters travelled since window start
    pub distance: f64,
}

impl MetricRecord {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Signed rate of turn at one gyroscope sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YawRateRecord {
    pub timestamp_ms: f64,
    pub race_time: f64,
    /// Degrees per second
    pub yaw_rate: f64,
}

/// Where the reference window's start and finish fall in the comparison trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompBounds {
    pub start_index: usize,
    pub finish_index: usize,
    pub start_ms: f64,
    pub finish_ms: f64,
}

impl CompBounds {
    /// Comparison window, or `None` when start and finish coincide.
    pub fn window(&self) -> Option<TimeWindow> {
        TimeWindow::new(self.start_ms, self.finish_ms).ok()
    }
}

/// Comparison against the other trace at one reference sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeDeltaRecord {
    /// Reference race time in seconds
    pub race_time: f64,
    /// Reference timestamp in the reference trace's space
    pub timestamp_ms: f64,
    /// Reference path distance in meters
    pub distance: f64,
    /// Comparison race time at the same path distance
    pub comparison_race_time: f64,
    /// Comparison timestamp at the same path distance, for seeking
    pub comparison_timestamp_ms: f64,
    /// Reference minus comparison race time; positive means the reference is slower
    pub delta: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// A de-duplicated close approach to a reference coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossingEvent {
    /// Timestamp of the cluster's middle sample
    pub timestamp_ms: f64,
    /// Index of the middle sample in the time-ordered stream
    pub sample_index: usize,
    /// Number of in-radius samples merged into this crossing
    pub sample_count: usize,
}

/// Interval between two consecutive crossings of a circuit's line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    /// Zero-based order
    pub lap_index: usize,
    /// One-based number for display
    pub lap_number: u32,
    pub start_ms: f64,
    pub finish_ms: f64,
    pub duration_s: f64,
    /// Whether the lap is part of the default selection
    pub included: bool,
}

impl Lap {
    pub fn window(&self) -> Option<TimeWindow> {
        TimeWindow::new(self.start_ms, self.finish_ms).ok()
    }
}

/// A matched start-then-finish traversal of a point-to-point course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_index: usize,
    pub run_number: u32,
    pub start_ms: f64,
    pub finish_ms: f64,
    pub duration_s: f64,
}

impl Run {
    pub fn window(&self) -> Option<TimeWindow> {
        TimeWindow::new(self.start_ms, self.finish_ms).ok()
    }
}

/// Configuration for the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignConfig {
    /// Radius around a start/finish coordinate that counts as a crossing (meters).
    /// Default: 20.0
    pub crossing_radius_m: f64,

    /// Preferred instrument speed. Default: 2D ground speed
    pub speed_source: SpeedSource,

    /// Samples on each side of the acceleration moving average.
    /// Default: 2 (5-sample window)
    pub acceleration_half_window: usize,

    /// Finite differences over a shorter interval are treated as zero (seconds).
    /// Default: 0.01
    pub min_acceleration_dt_s: f64,

    /// Look-back span of the closing/opening rate (seconds). Default: 5.0
    pub closing_rate_window_s: f64,

    /// Closing rate is zero when less than this has elapsed (seconds). Default: 0.1
    pub min_closing_rate_dt_s: f64,

    /// Leave the first and last lap out of the default selection. Default: true
    pub exclude_warmup_cooldown: bool,

    /// Maximum points handed to a chart series. Default: 500
    pub chart_max_points: usize,

    /// Douglas-Peucker tolerance for the course map (degrees).
    /// Default: 0.00002 (~2 meters)
    pub course_simplify_tolerance_deg: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            crossing_radius_m: crossings::DEFAULT_CROSSING_RADIUS_M,
            speed_source: SpeedSource::TwoD,
            acceleration_half_window: 2,
            min_acceleration_dt_s: 0.01,
            closing_rate_window_s: 5.0,
            min_closing_rate_dt_s: 0.1,
            exclude_warmup_cooldown: true,
            chart_max_points: 500,
            course_simplify_tolerance_deg: 0.00002,
        }
    }
}

impl AlignConfig {
    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("crossing_radius_m", self.crossing_radius_m),
            ("closing_rate_window_s", self.closing_rate_window_s),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(LapDeltaError::ConfigError {
                    message: format!("{} must be positive, got {}", name, value),
                });
            }
        }
        let non_negative = [
            ("min_acceleration_dt_s", self.min_acceleration_dt_s),
            ("min_closing_rate_dt_s", self.min_closing_rate_dt_s),
            (
                "course_simplify_tolerance_deg",
                self.course_simplify_tolerance_deg,
            ),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(LapDeltaError::ConfigError {
                    message: format!("{} must be non-negative, got {}", name, value),
                });
            }
        }
        if self.chart_max_points < 2 {
            return Err(LapDeltaError::ConfigError {
                message: "chart_max_points must be at least 2".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Core Functions
// ============================================================================

/// Borrow the samples if already in time order, otherwise return a sorted copy.
///
/// The sort is stable, so samples sharing a timestamp keep arrival order.
pub(crate) fn sorted_by_timestamp<T: Timestamped + Clone>(samples: &[T]) -> Cow<'_, [T]> {
    let in_order = samples
        .windows(2)
        .all(|w| w[0].timestamp_ms() <= w[1].timestamp_ms());
    if in_order {
        Cow::Borrowed(samples)
    } else {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.timestamp_ms().total_cmp(&b.timestamp_ms()));
        Cow::Owned(sorted)
    }
}

// ============================================================================
// Tests
// ============================================================================
