//! Command-line entry points for calibration.
//!
//! Two binaries share this library:
//!
//! - `calib-optimize` loads one or more run configurations and drives the
//!   optimizer against each. A configuration that fails to load or
//!   validate is skipped and the batch continues; a missing dataset, mesh
//!   or executable aborts the batch before any evaluation.
//! - `calib-worker --config <file> <input> <output>` performs a single
//!   evaluation on behalf of the host and writes its cost.
//!
//! Both log through `tracing`; set `RUST_LOG` to change the level.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod logging;
mod optimize;
mod worker;

pub use logging::init_tracing;
pub use optimize::{DRIVER_REPORT_FILE, EngineArg, OptimizeArgs, optimize_config, run_batch};
pub use worker::{WorkerArgs, run_worker};
