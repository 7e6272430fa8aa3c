//! Optimizer engines and the loop that drives them.
//!
//! Every engine searches the normalized unit cube and sees the calibration
//! harness only through [`Objective`]. Two engine shapes exist:
//!
//! - [`AskTellEngine`]: propose a generation, receive its costs, update.
//!   [`SeparableCmaEs`] is the default engine.
//! - [`CallbackEngine`]: call the objective directly within a budget.
//!   [`LatinHypercubeSearch`] runs a space-filling design followed by local
//!   refinement.
//!
//! [`OptimizationDriver`] runs either shape until the engine's own stop
//! criterion or an external ceiling fires and reports the best point in
//! both normalized and physical units.
//!
//! # Example
//!
//! ```
//! use calib_driver::{FnObjective, OptimizationDriver};
//! use calib_eval::{EngineKind, OptimizerConfig};
//! use calib_params::{ParameterSpace, ParameterSpec, PropertyKind};
//!
//! let space = ParameterSpace::new(vec![
//!     ParameterSpec::new("A", "RegionA", PropertyKind::Modulus, 1.0e5, 1.0e7).unwrap(),
//!     ParameterSpec::new("B", "RegionB", PropertyKind::Modulus, 1.0e5, 1.0e7).unwrap(),
//! ])
//! .unwrap();
//! let settings = OptimizerConfig {
//!     engine: EngineKind::Lhs,
//!     max_evaluations: Some(40),
//!     ..OptimizerConfig::default()
//! };
//! let mut objective = FnObjective::new(2, |x: &[f64]| x.iter().map(|v| v * v).sum());
//!
//! let report = OptimizationDriver::from_config(&settings, space)
//!     .run_configured(&settings, &mut objective)
//!     .unwrap();
//! assert_eq!(report.evaluations, 40);
//! assert!(report.best_physical.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod cmaes;
mod driver;
mod engine;
mod error;
mod lhs;
mod objective;

pub use cmaes::{CmaesSettings, DEFAULT_SIGMA, DEFAULT_X0, SeparableCmaEs, default_population};
pub use driver::{DEFAULT_CALLBACK_BUDGET, DriverReport, OptimizationDriver, StopReason};
pub use engine::{AskTellEngine, CallbackEngine, Candidate, EngineStop, EngineSummary};
pub use error::{DriverError, DriverResult};
pub use lhs::{LatinHypercubeSearch, LhsSettings, latin_hypercube};
pub use objective::{FnObjective, Objective};
