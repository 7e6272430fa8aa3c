//! Isolated simulation workers.
//!
//! Each evaluation runs the structural simulation in a child process. The
//! host and the worker exchange two small text files:
//!
//! - the **input artifact** carries the environment header and the
//!   normalized parameter vector ([`WorkerRequest`]);
//! - the **output artifact** carries a single real number, the cost.
//!
//! [`ProcessSupervisor`] writes the input, launches the worker, enforces a
//! wall-clock deadline and reads the cost back. It never fails: a worker that
//! cannot start, hangs, crashes without output, or writes garbage yields
//! [`SENTINEL_COST`](calib_params::SENTINEL_COST).
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use calib_supervisor::{ProcessSupervisor, WorkerCommand, WorkerHeader};
//!
//! let supervisor = ProcessSupervisor::scoped("/tmp/calib-scratch");
//! let worker = WorkerCommand::new("calib-worker").with_args(["--config", "run.json"]);
//! let header = WorkerHeader::new("/data/meshes", "/data/output", "VenusA_L26");
//!
//! let cost = supervisor.run_worker(&worker, &header, &[0.5; 5], Duration::from_secs(900));
//! println!("cost = {cost}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod paths;
mod protocol;
mod supervisor;

pub use error::{ProtocolError, SupervisorError, SupervisorResult};
pub use paths::{INPUT_FILE, OUTPUT_FILE, WorkerPaths};
pub use protocol::{WorkerHeader, WorkerRequest, parse_cost, read_cost, write_cost};
pub use supervisor::{
    DEFAULT_TIMEOUT, POLL_INTERVAL, ProcessSupervisor, WorkerCommand, WorkerOutcome, WorkerStatus,
};
