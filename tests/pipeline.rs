//! End-to-end pipeline tests on synthetic traces.
//!
//! Courses are generated analytically (a circle for circuits, a straight line
//! for point-to-point) so lap times and deltas are known in advance.
//!
//! Run with: `cargo test --test pipeline`
//! Logs: `RUST_LOG=debug cargo test --test pipeline -- --nocapture`

use std::f64::consts::PI;

use lap_delta::{
    AlignConfig, AnalysisEngine, CourseMode, GpsPoint, LapDeltaError, PositionSample, Trace,
    TraceRole,
};

const CENTER_LAT: f64 = 45.0;
const CENTER_LNG: f64 = 7.0;
const RADIUS_M: f64 = 200.0;
const METERS_PER_DEG: f64 = 111_194.93;
const HZ: f64 = 5.0;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn offset(north_m: f64, east_m: f64) -> (f64, f64) {
    (
        CENTER_LAT + north_m / METERS_PER_DEG,
        CENTER_LNG + east_m / (METERS_PER_DEG * CENTER_LAT.to_radians().cos()),
    )
}

/// Point on the circle where the start/finish line sits.
fn line_point() -> GpsPoint {
    let (lat, lng) = offset(0.0, RADIUS_M);
    GpsPoint::new(lat, lng)
}

/// Drive the circle counter-clockwise at `speed` m/s, from a quarter lap
/// before the line through 3.5 laps.
fn circuit_trace(speed: f64) -> Trace {
    let omega = speed / RADIUS_M;
    let start = -PI / 2.0;
    let total_time = 7.0 * PI / omega;
    let count = (total_time * HZ) as usize;

    let positions = (0..=count)
        .map(|i| {
            let t = i as f64 / HZ;
            let theta = start + omega * t;
            let (lat, lng) = offset(RADIUS_M * theta.sin(), RADIUS_M * theta.cos());
            PositionSample::new(t * 1000.0, lat, lng)
        })
        .collect();
    Trace::new(positions, Vec::new())
}

/// Drive north along a straight line at `speed` m/s for `length_m` metres.
fn straight_trace(speed: f64, length_m: f64) -> Trace {
    let count = (length_m / speed * HZ).round() as usize;
    let positions = (0..=count)
        .map(|i| {
            let t = i as f64 / HZ;
            let (lat, lng) = offset(speed * t, 0.0);
            PositionSample::new(t * 1000.0, lat, lng)
                .with_speed(Some(speed), None)
        })
        .collect();
    Trace::new(positions, Vec::new())
}

// ============================================================================
// Circuit
// ============================================================================

#[test]
fn test_circuit_laps_and_delta() {
    init_logging();
    let lap_time = |speed: f64| 2.0 * PI * RADIUS_M / speed;

    let mut engine = AnalysisEngine::new(AlignConfig::default()).unwrap();
    engine.set_mode(CourseMode::Circuit);
    engine.set_reference_trace(circuit_trace(20.0));
    engine.set_comparison_trace(circuit_trace(19.0));

    let line = line_point();
    let ref_laps = engine.laps(TraceRole::Reference, &line).unwrap();
    let comp_laps = engine.laps(TraceRole::Comparison, &line).unwrap();

    // Four crossings, three laps, out-lap and in-lap flagged
    assert_eq!(ref_laps.len(), 3);
    assert_eq!(
        ref_laps.iter().map(|l| l.included).collect::<Vec<_>>(),
        vec![false, true, false]
    );
    for lap in &ref_laps {
        assert!(
            (lap.duration_s - lap_time(20.0)).abs() < 0.5,
            "lap {} took {:.2}s",
            lap.lap_number,
            lap.duration_s
        );
    }

    engine.select_reference_lap(&ref_laps[1]).unwrap();
    engine.select_comparison_lap(&comp_laps[1]).unwrap();
    let analysis = engine.analyze().unwrap();

    let expected = lap_time(20.0) - lap_time(19.0);
    assert!(
        (analysis.final_delta - expected).abs() < 1.0,
        "final delta {:.3}, expected {:.3}",
        analysis.final_delta,
        expected
    );
    // The faster reference pulls away steadily
    let quarter = analysis.time_delta.len() / 4;
    assert!(analysis.time_delta[quarter * 3].delta < analysis.time_delta[quarter].delta);
    assert!(analysis.closing_rate[quarter * 2] < 0.0);
}

// ============================================================================
// Point to point
// ============================================================================

#[test]
fn test_point_to_point_runs() {
    init_logging();
    let mut engine = AnalysisEngine::new(AlignConfig::default()).unwrap();
    engine.set_reference_trace(straight_trace(10.0, 600.0));

    let (start_lat, start_lng) = offset(100.0, 0.0);
    let (finish_lat, finish_lng) = offset(500.0, 0.0);
    let runs = engine
        .runs(
            TraceRole::Reference,
            &GpsPoint::new(start_lat, start_lng),
            &GpsPoint::new(finish_lat, finish_lng),
        )
        .unwrap();

    assert_eq!(runs.len(), 1);
    assert!((runs[0].duration_s - 40.0).abs() < 0.5);
    assert!(matches!(
        engine.runs(
            TraceRole::Comparison,
            &GpsPoint::new(start_lat, start_lng),
            &GpsPoint::new(finish_lat, finish_lng),
        ),
        Err(LapDeltaError::MissingTrace { .. })
    ));
}

#[test]
fn test_reference_beyond_comparison_clamps() {
    init_logging();
    let mut engine = AnalysisEngine::new(AlignConfig::default()).unwrap();
    engine.set_reference_trace(straight_trace(10.0, 600.0));
    engine.set_comparison_trace(straight_trace(10.0, 500.0));
    engine.mark_course(0.0, 60.0).unwrap();

    let analysis = engine.analyze().unwrap();
    let bounds = analysis.comp_bounds.unwrap();
    // Finish lies past the comparison's end: falls back to its last sample
    assert_eq!(bounds.finish_ms, 50_000.0);

    let comp_last = analysis.comparison_metrics.last().unwrap();
    let clamped: Vec<_> = analysis
        .time_delta
        .iter()
        .filter(|d| d.distance > comp_last.distance)
        .collect();
    assert!(!clamped.is_empty());
    for d in clamped {
        assert_eq!(d.comparison_race_time, comp_last.race_time);
    }
    assert!((analysis.final_delta - 10.0).abs() < 0.5);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_repeated_analysis_is_identical() {
    init_logging();
    let mut engine = AnalysisEngine::new(AlignConfig::default()).unwrap();
    engine.set_reference_trace(circuit_trace(20.0));
    engine.set_comparison_trace(circuit_trace(18.5));
    engine.mark_course(10.0, 90.0).unwrap();

    let first = engine.analyze().unwrap().to_json().unwrap();
    let second = engine.analyze().unwrap().to_json().unwrap();
    assert_eq!(first, second);
}
