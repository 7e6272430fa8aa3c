//! The worker side of one evaluation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calib_eval::{CalibrationConfig, evaluate_request};
use calib_params::SENTINEL_COST;
use calib_supervisor::{WorkerRequest, write_cost};
use clap::Args;
use tracing::{error, info};

/// Arguments of `calib-worker`.
#[derive(Debug, Clone, Args)]
pub struct WorkerArgs {
    /// Run configuration shared with the host.
    #[arg(long)]
    pub config: PathBuf,

    /// Input artifact written by the host.
    pub input: PathBuf,

    /// Output artifact to write the cost into.
    pub output: PathBuf,
}

/// Evaluate the request in `args.input` and write its cost to
/// `args.output`.
///
/// Evaluation failures are scored as the sentinel and still succeed. When
/// the config or request cannot be read, the sentinel is written anyway
/// and the error is returned.
///
/// # Errors
///
/// Returns an error if the config or input artifact cannot be read, or the
/// output artifact cannot be written.
pub fn run_worker(args: &WorkerArgs) -> Result<f64> {
    let setup = CalibrationConfig::load(&args.config)
        .context("loading worker config")
        .and_then(|config| {
            let request = WorkerRequest::read(&args.input).context("reading input artifact")?;
            Ok((config, request))
        });

    let (config, request) = match setup {
        Ok(setup) => setup,
        Err(err) => {
            error!(error = %err, "Worker cannot evaluate; reporting sentinel");
            // Best effort; the host treats a missing output as a failure too.
            let _ = write_cost(&args.output, SENTINEL_COST);
            return Err(err);
        }
    };

    let cost = evaluate_request(&config, &request);
    write_output(&args.output, cost)?;
    info!(cost, output = %args.output.display(), "Worker finished");
    Ok(cost)
}

fn write_output(path: &Path, cost: f64) -> Result<()> {
    write_cost(path, cost).with_context(|| format!("writing cost to {}", path.display()))
}
