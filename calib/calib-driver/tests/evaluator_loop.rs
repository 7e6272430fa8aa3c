//! The driver against a real [`SimulationEvaluator`] with a scripted
//! backend in place of the structural solver.

#![allow(clippy::unwrap_used)]

use std::fs;

use approx::assert_relative_eq;
use calib_driver::{CmaesSettings, OptimizationDriver, SeparableCmaEs, StopReason};
use calib_eval::{
    BestTracker, EvaluationBackend, EvaluationFailure, EvaluationStage, IterationLog, Sample,
    SimulationEvaluator,
};
use calib_params::{ParameterSpace, ParameterSpec, PropertyKind, SENTINEL_COST};

/// Sphere around 0.4 in normalized units; every fifth call fails.
struct Bowl;

impl EvaluationBackend for Bowl {
    fn evaluate(&mut self, sample: &Sample<'_>) -> Result<f64, EvaluationFailure> {
        if sample.iteration % 5 == 0 {
            return Err(EvaluationFailure::new(EvaluationStage::SolverRun, "diverged"));
        }
        Ok(sample.normalized.iter().map(|v| (v - 0.4).powi(2)).sum())
    }
}

fn space() -> ParameterSpace {
    ParameterSpace::new(vec![
        ParameterSpec::new("A", "RegionA", PropertyKind::Modulus, 1.0e5, 1.0e7).unwrap(),
        ParameterSpec::new("B", "RegionB", PropertyKind::Modulus, 1.0e5, 1.0e7).unwrap(),
    ])
    .unwrap()
}

#[test]
fn every_evaluation_is_logged_and_the_best_agrees() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("optimization_log.csv");
    let space = space();
    let log = IterationLog::open(&log_path, space.names()).unwrap();
    let mut evaluator =
        SimulationEvaluator::new(space.clone(), Bowl, log, BestTracker::new(1.0e8, -1.0));
    let mut engine = SeparableCmaEs::new(CmaesSettings::centered(2, 21)).unwrap();

    let report = OptimizationDriver::new(space)
        .with_max_evaluations(24)
        .run_ask_tell(&mut engine, &mut evaluator)
        .unwrap();

    assert_eq!(report.stop, StopReason::MaxEvaluations);
    assert_eq!(report.evaluations, 24);
    assert_eq!(evaluator.iterations(), 24);

    let log = fs::read_to_string(&log_path).unwrap();
    let rows: Vec<&str> = log.lines().collect();
    assert_eq!(rows[0], "Iteration,A,B,Cost");
    assert_eq!(rows.len(), 25);
    assert!(rows[5].starts_with("5,"));
    assert!(rows[5].ends_with(",1000000000"));

    let best = report.best.unwrap();
    assert!(best.cost < SENTINEL_COST);
    let tracked = evaluator.best().unwrap();
    assert_relative_eq!(tracked.cost, best.cost);
    let physical = report.best_physical.unwrap();
    assert_relative_eq!(tracked.parameters[0], physical[0], max_relative = 1e-12);
    assert_relative_eq!(tracked.parameters[1], physical[1], max_relative = 1e-12);
}
