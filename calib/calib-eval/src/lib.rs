//! One calibration evaluation, end to end.
//!
//! An evaluation takes a normalized parameter vector from the optimizer and
//! returns a finite cost:
//!
//! 1. clamp and denormalize the vector into region properties;
//! 2. build a fresh [`ModelSet`] (device plus tissue deck);
//! 3. write region materials into the tissue with
//!    [`MaterialMapper`](calib_material::MaterialMapper);
//! 4. run the [`StructuralSolver`];
//! 5. score the deployed surface with the discrepancy engine;
//! 6. append one row to the [`IterationLog`] and offer the cost to the
//!    [`BestTracker`].
//!
//! Steps 2 to 5 run in an [`EvaluationBackend`]: [`InProcessBackend`] runs
//! them here, [`WorkerBackend`] hands them to a supervised child process
//! that calls [`evaluate_request`]. Any failure is logged with its
//! [`EvaluationStage`] and scored as
//! [`SENTINEL_COST`](calib_params::SENTINEL_COST).
//!
//! # Example
//!
//! ```no_run
//! use calib_eval::{
//!     BestTracker, CalibrationConfig, DirectorySnapshot, IterationLog, SimulationEvaluator,
//!     WorkerBackend,
//! };
//! use std::path::Path;
//!
//! let config = CalibrationConfig::load(Path::new("run.json")).unwrap();
//! let space = config.parameter_space().unwrap();
//! let log = IterationLog::open(config.log_file(), space.names()).unwrap();
//!
//! let mut evaluator = SimulationEvaluator::new(
//!     space,
//!     WorkerBackend::from_config(&config),
//!     log,
//!     BestTracker::from(config.best),
//! )
//! .with_snapshot(DirectorySnapshot::under(&config.output_root));
//!
//! let cost = evaluator.evaluate(&[0.5; 5]);
//! println!("cost = {cost}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod backend;
mod best;
mod config;
mod device;
mod error;
mod evaluator;
mod log;
mod model_set;
mod solver;
mod stage;
mod worker;

pub use backend::{EvaluationBackend, InProcessBackend, Sample, WorkerBackend};
pub use best::{BestResult, BestTracker, DirectorySnapshot, SnapshotSink};
pub use config::{
    BestConfig, CalibrationConfig, DEFAULT_LOG_FILE, DEFAULT_SIMULATED_SURFACE, ElasticMaterial,
    EngineKind, MODULUS_EXPORT_FILE, OptimizerConfig, RegionConfig, ScoringConfig, SolverConfig,
    WorkerConfig, default_regions, reference_slice_targets,
};
pub use device::{
    ContactSettings, DEFAULT_VARIANT, DeviceFiles, DeviceModel, SuperelasticMaterial,
    VENUS_A_LENGTHS, default_device_variants,
};
pub use error::{ConfigError, ConfigResult, EvalError, EvalResult};
pub use evaluator::SimulationEvaluator;
pub use log::{IterationLog, format_row};
pub use model_set::{BOUNDARY_KEYWORD, ModelSet, ModelSetBuilder};
pub use solver::{CommandSolver, SolveStatus, SolverSettings, StructuralSolver};
pub use stage::{EvaluationFailure, EvaluationStage};
pub use worker::evaluate_request;
