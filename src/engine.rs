//! # Analysis Engine
//!
//! Explicit context for one comparison: both traces, the course mode, the
//! chosen windows and the configuration. Callers own the engine and pass it
//! around by reference; there is no global state.
//!
//! ## Pipeline
//!
//! 1. Reference metrics for the reference window
//! 2. Comparison window: a selected lap/run, or located from the reference
//!    window's first and last positions
//! 3. Comparison metrics, both yaw-rate series
//! 4. Distance-keyed time delta
//! 5. Acceleration, closing rate and the yaw-rate chart on the distance axis
//!
//! Every change to the engine bumps a generation counter that is stamped on
//! each [`Analysis`], so a caller recomputing after a window change can drop
//! results from superseded requests with [`AnalysisEngine::is_current`].

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::algorithms::{decimate, simplify_course};
use crate::alignment::{compute_time_delta, seek_point, SeekPoint};
use crate::bounds::find_comp_bounds_for;
use crate::crossings::{detect_laps, detect_runs};
use crate::error::{LapDeltaError, OptionExt, Result, TraceRole};
use crate::metrics::{compute_metrics_with_source, max_speed, speed_at_race_time};
use crate::motion::{compute_yaw_rate, yaw_rate_chart, YawChartPoint};
use crate::smoothing::{compute_acceleration, compute_closing_rate};
use crate::{
    AlignConfig, CompBounds, CourseMode, GpsPoint, Lap, MetricRecord,
    MotionSample, PositionSample, Run, TimeDeltaRecord, TimeWindow, YawRateRecord,
};

// ============================================================================
// Core Types
// ============================================================================

/// One recording's telemetry, sorted by timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    positions: Vec<PositionSample>,
    motion: Vec<MotionSample>,
}

impl Trace {
    /// Build a trace from extractor output in arrival order.
    ///
    /// Both streams are sorted by timestamp; position samples with invalid
    /// coordinates or timestamps are dropped.
    pub fn new(positions: Vec<PositionSample>, motion: Vec<MotionSample>) -> Self {
        let total = positions.len();
        let mut valid: Vec<PositionSample> = positions
            .into_iter()
            .filter(|s| s.point().is_valid() && s.timestamp_ms.is_finite())
            .collect();
        if valid.len() < total {
            warn!(
                "[Trace] Dropped {} of {} position samples with invalid coordinates",
                total - valid.len(),
                total
            );
        }
        let mut motion: Vec<MotionSample> = motion
            .into_iter()
            .filter(|s| s.timestamp_ms.is_finite())
            .collect();
        valid.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
        motion.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));

        Self {
            positions: valid,
            motion,
        }
    }

    pub fn positions(&self) -> &[PositionSample] {
        &self.positions
    }

    pub fn motion(&self) -> &[MotionSample] {
        &self.motion
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn samples_in(&self, window: &TimeWindow) -> usize {
        self.positions
            .iter()
            .filter(|s| window.contains(s.timestamp_ms))
            .count()
    }
}

/// A point on the course map, colored by how the gap is evolving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoursePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub race_time: f64,
    /// Reference speed in m/s
    pub speed: f64,
    pub delta: f64,
    pub closing_rate: f64,
}

/// Everything derived for one pair of windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Engine generation this analysis was computed for
    pub generation: u64,
    pub reference_window: TimeWindow,
    pub comparison_window: TimeWindow,
    /// Located start/finish, `None` when the comparison window was selected
    pub comp_bounds: Option<CompBounds>,
    pub reference_metrics: Vec<MetricRecord>,
    pub comparison_metrics: Vec<MetricRecord>,
    pub reference_yaw_rate: Vec<YawRateRecord>,
    pub comparison_yaw_rate: Vec<YawRateRecord>,
    /// Reference yaw samples with the nearest comparison value, keyed on distance
    pub yaw_rate_chart: Vec<YawChartPoint>,
    pub time_delta: Vec<TimeDeltaRecord>,
    /// m/s², aligned with `reference_metrics`
    pub reference_acceleration: Vec<f64>,
    /// m/s², aligned with `comparison_metrics`
    pub comparison_acceleration: Vec<f64>,
    /// Aligned with `time_delta`
    pub closing_rate: Vec<f64>,
    pub reference_total_time: f64,
    pub comparison_total_time: f64,
    /// m/s
    pub reference_max_speed: f64,
    pub comparison_max_speed: f64,
    /// Delta at the reference finish; positive means the reference was slower
    pub final_delta: f64,
}

impl Analysis {
    /// Serialize for the charting layer.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Seek positions in both recordings for a reference race time.
    pub fn seek(&self, race_time: f64) -> Option<SeekPoint> {
        seek_point(&self.time_delta, race_time)
    }

    /// Reference speed at a race time, for course-map hover.
    pub fn reference_speed_at(&self, race_time: f64) -> f64 {
        speed_at_race_time(&self.reference_metrics, race_time)
    }

    /// Comparison speed at one of its own race times.
    pub fn comparison_speed_at(&self, race_time: f64) -> f64 {
        speed_at_race_time(&self.comparison_metrics, race_time)
    }

    /// Simplified course polyline carrying delta and closing rate per point.
    pub fn course_map(&self, tolerance_deg: f64) -> Vec<CoursePoint> {
        simplify_course(&self.time_delta, tolerance_deg)
            .into_iter()
            .map(|i| {
                let d = &self.time_delta[i];
                CoursePoint {
                    latitude: d.latitude,
                    longitude: d.longitude,
                    race_time: d.race_time,
                    speed: self.reference_speed_at(d.race_time),
                    delta: d.delta,
                    closing_rate: self.closing_rate.get(i).copied().unwrap_or(0.0),
                }
            })
            .collect()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Yaw rate and acceleration for one trace, built once its metrics exist.
struct TraceSeries {
    metrics: Vec<MetricRecord>,
    yaw_rate: Vec<YawRateRecord>,
    acceleration: Vec<f64>,
}

fn build_series(trace: &Trace, window: &TimeWindow, config: &AlignConfig) -> TraceSeries {
    let metrics = compute_metrics_with_source(trace.positions(), window, config.speed_source);
    complete_series(trace, window, metrics, config)
}

fn complete_series(
    trace: &Trace,
    window: &TimeWindow,
    metrics: Vec<MetricRecord>,
    config: &AlignConfig,
) -> TraceSeries {
    let yaw_rate = compute_yaw_rate(trace.motion(), window);
    let acceleration = compute_acceleration(
        &metrics,
        config.acceleration_half_window,
        config.min_acceleration_dt_s,
    );
    TraceSeries {
        metrics,
        yaw_rate,
        acceleration,
    }
}

#[cfg(feature = "parallel")]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    rayon::join(a, b)
}

#[cfg(not(feature = "parallel"))]
fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA,
    B: FnOnce() -> RB,
{
    (a(), b())
}

fn require_positions(trace: &Trace, role: TraceRole) -> Result<()> {
    if trace.is_empty() {
        return Err(LapDeltaError::InvalidCoordinates {
            trace: role,
            message: "no valid position samples".to_string(),
        });
    }
    Ok(())
}

fn require_series(
    metrics: &[MetricRecord],
    trace: &Trace,
    window: &TimeWindow,
    role: TraceRole,
) -> Result<()> {
    if metrics.is_empty() {
        return Err(LapDeltaError::InsufficientSamples {
            trace: role,
            sample_count: trace.samples_in(window),
            minimum_required: 2,
        });
    }
    Ok(())
}

/// Run the full pipeline.
///
/// With `comparison_window` set, that window is used directly (a selected lap
/// or run). Otherwise the comparison window is located from the reference
/// window's first and last positions.
pub fn analyze(
    reference: &Trace,
    comparison: &Trace,
    reference_window: &TimeWindow,
    comparison_window: Option<&TimeWindow>,
    config: &AlignConfig,
) -> Result<Analysis> {
    config.validate()?;
    require_positions(reference, TraceRole::Reference)?;
    require_positions(comparison, TraceRole::Comparison)?;

    let ref_metrics =
        compute_metrics_with_source(reference.positions(), reference_window, config.speed_source);
    require_series(&ref_metrics, reference, reference_window, TraceRole::Reference)?;

    let (comp_window, comp_bounds) = match comparison_window {
        Some(window) => (*window, None),
        None => {
            let bounds = find_comp_bounds_for(comparison.positions(), &ref_metrics)
                .ok_or_insufficient_samples(TraceRole::Comparison, 0, 2)?;
            let window = bounds.window().ok_or_insufficient_samples(
                TraceRole::Comparison,
                bounds.finish_index.saturating_sub(bounds.start_index) + 1,
                2,
            )?;
            (window, Some(bounds))
        }
    };

    let (ref_series, comp_series) = join(
        || complete_series(reference, reference_window, ref_metrics, config),
        || build_series(comparison, &comp_window, config),
    );
    require_series(&comp_series.metrics, comparison, &comp_window, TraceRole::Comparison)?;

    let time_delta = compute_time_delta(&ref_series.metrics, &comp_series.metrics);
    let closing_rate = compute_closing_rate(
        &time_delta,
        config.closing_rate_window_s,
        config.min_closing_rate_dt_s,
    );

    let reference_total_time = ref_series.metrics.last().map(|m| m.race_time).unwrap_or(0.0);
    let comparison_total_time = comp_series.metrics.last().map(|m| m.race_time).unwrap_or(0.0);
    let final_delta = time_delta.last().map(|d| d.delta).unwrap_or(0.0);
    let reference_max_speed = max_speed(&ref_series.metrics);
    let comparison_max_speed = max_speed(&comp_series.metrics);
    let yaw_chart = yaw_rate_chart(
        &ref_series.yaw_rate,
        &comp_series.yaw_rate,
        &ref_series.metrics,
    );

    info!(
        "[Analysis] reference {:.2}s / comparison {:.2}s over {} samples, final delta {:+.3}s",
        reference_total_time,
        comparison_total_time,
        time_delta.len(),
        final_delta
    );

    Ok(Analysis {
        generation: 0,
        reference_window: *reference_window,
        comparison_window: comp_window,
        comp_bounds,
        reference_metrics: ref_series.metrics,
        comparison_metrics: comp_series.metrics,
        reference_yaw_rate: ref_series.yaw_rate,
        comparison_yaw_rate: comp_series.yaw_rate,
        yaw_rate_chart: yaw_chart,
        time_delta,
        reference_acceleration: ref_series.acceleration,
        comparison_acceleration: comp_series.acceleration,
        closing_rate,
        reference_total_time,
        comparison_total_time,
        reference_max_speed,
        comparison_max_speed,
        final_delta,
    })
}

// ============================================================================
// Analysis Engine
// ============================================================================

/// Holds the state a comparison is built from.
///
/// Loading a trace or changing the mode clears window selections, since they
/// refer to timestamps of the previous data.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    reference: Option<Trace>,
    comparison: Option<Trace>,
    mode: CourseMode,
    reference_window: Option<TimeWindow>,
    comparison_window: Option<TimeWindow>,
    config: AlignConfig,
    generation: u64,
}

impl AnalysisEngine {
    /// Create an engine. Fails if the configuration is invalid.
    pub fn new(config: AlignConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reference: None,
            comparison: None,
            mode: CourseMode::PointToPoint,
            reference_window: None,
            comparison_window: None,
            config,
            generation: 0,
        })
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    pub fn mode(&self) -> CourseMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reference_window(&self) -> Option<TimeWindow> {
        self.reference_window
    }

    pub fn comparison_window(&self) -> Option<TimeWindow> {
        self.comparison_window
    }

    fn bump(&mut self) {
        self.generation += 1;
    }

    fn clear_selection(&mut self) {
        self.reference_window = None;
        self.comparison_window = None;
    }

    pub fn set_reference_trace(&mut self, trace: Trace) {
        info!("[Engine] Reference trace: {} positions", trace.positions().len());
        self.reference = Some(trace);
        self.clear_selection();
        self.bump();
    }

    pub fn set_comparison_trace(&mut self, trace: Trace) {
        info!("[Engine] Comparison trace: {} positions", trace.positions().len());
        self.comparison = Some(trace);
        self.clear_selection();
        self.bump();
    }

    pub fn set_mode(&mut self, mode: CourseMode) {
        if mode != self.mode {
            self.mode = mode;
            self.clear_selection();
            self.bump();
        }
    }

    pub fn set_config(&mut self, config: AlignConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.bump();
        Ok(())
    }

    /// Set the reference window from start/finish marks in the reference
    /// recording, in seconds. The comparison window goes back to being located.
    pub fn mark_course(&mut self, start_s: f64, finish_s: f64) -> Result<()> {
        self.set_window(TimeWindow::from_seconds(start_s, finish_s)?);
        Ok(())
    }

    pub fn set_window(&mut self, window: TimeWindow) {
        debug!(
            "[Engine] Reference window {:.0}..{:.0}ms",
            window.start_ms, window.finish_ms
        );
        self.reference_window = Some(window);
        self.comparison_window = None;
        self.bump();
    }

    /// Use one of the reference trace's laps as the reference window.
    pub fn select_reference_lap(&mut self, lap: &Lap) -> Result<()> {
        let window = lap_window(lap.window(), lap.start_ms, lap.finish_ms)?;
        self.reference_window = Some(window);
        self.bump();
        Ok(())
    }

    /// Use one of the comparison trace's laps instead of locating the window.
    pub fn select_comparison_lap(&mut self, lap: &Lap) -> Result<()> {
        let window = lap_window(lap.window(), lap.start_ms, lap.finish_ms)?;
        self.comparison_window = Some(window);
        self.bump();
        Ok(())
    }

    pub fn select_reference_run(&mut self, run: &Run) -> Result<()> {
        let window = lap_window(run.window(), run.start_ms, run.finish_ms)?;
        self.reference_window = Some(window);
        self.bump();
        Ok(())
    }

    pub fn select_comparison_run(&mut self, run: &Run) -> Result<()> {
        let window = lap_window(run.window(), run.start_ms, run.finish_ms)?;
        self.comparison_window = Some(window);
        self.bump();
        Ok(())
    }

    fn trace(&self, role: TraceRole) -> Result<&Trace> {
        match role {
            TraceRole::Reference => self.reference.as_ref(),
            TraceRole::Comparison => self.comparison.as_ref(),
        }
        .ok_or_missing(role)
    }

    fn require_mode(&self, mode: CourseMode) -> Result<()> {
        if self.mode != mode {
            return Err(LapDeltaError::ConfigError {
                message: format!("engine is in {:?} mode, operation needs {:?}", self.mode, mode),
            });
        }
        Ok(())
    }

    /// Laps of one trace through a circuit line. Needs [`CourseMode::Circuit`].
    pub fn laps(&self, role: TraceRole, line: &GpsPoint) -> Result<Vec<Lap>> {
        self.require_mode(CourseMode::Circuit)?;
        let trace = self.trace(role)?;
        Ok(detect_laps(
            trace.positions(),
            line,
            self.config.crossing_radius_m,
            self.config.exclude_warmup_cooldown,
        ))
    }

    /// Runs of one trace between separate start and finish coordinates.
    /// Needs [`CourseMode::PointToPoint`].
    pub fn runs(&self, role: TraceRole, start: &GpsPoint, finish: &GpsPoint) -> Result<Vec<Run>> {
        self.require_mode(CourseMode::PointToPoint)?;
        let trace = self.trace(role)?;
        Ok(detect_runs(
            trace.positions(),
            start,
            finish,
            self.config.crossing_radius_m,
        ))
    }

    /// Run the pipeline on the current state.
    pub fn analyze(&self) -> Result<Analysis> {
        let reference = self.trace(TraceRole::Reference)?;
        let comparison = self.trace(TraceRole::Comparison)?;
        let window = self
            .reference_window
            .ok_or_else(|| LapDeltaError::ConfigError {
                message: "no reference window marked".to_string(),
            })?;

        let mut analysis = analyze(
            reference,
            comparison,
            &window,
            self.comparison_window.as_ref(),
            &self.config,
        )?;
        analysis.generation = self.generation;
        Ok(analysis)
    }

    /// Course map simplified with the configured tolerance.
    pub fn course_map(&self, analysis: &Analysis) -> Vec<CoursePoint> {
        analysis.course_map(self.config.course_simplify_tolerance_deg)
    }

    /// Delta series thinned to the configured chart size.
    pub fn chart_deltas(&self, analysis: &Analysis) -> Vec<TimeDeltaRecord> {
        decimate(&analysis.time_delta, self.config.chart_max_points)
    }

    /// Whether `analysis` reflects the engine's current state.
    pub fn is_current(&self, analysis: &Analysis) -> bool {
        analysis.generation == self.generation
    }
}

fn lap_window(window: Option<TimeWindow>, start_ms: f64, finish_ms: f64) -> Result<TimeWindow> {
    window.ok_or(LapDeltaError::InvalidWindow {
        start_ms,
        finish_ms,
    })
}
