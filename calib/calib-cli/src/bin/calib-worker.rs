//! Evaluate one calibration sample on behalf of `calib-optimize`.

use anyhow::Result;
use calib_cli::{WorkerArgs, init_tracing, run_worker};
use clap::Parser;

/// Vessel stiffness calibration worker
///
/// Reads the input artifact, runs one evaluation and writes the cost to
/// the output artifact.
#[derive(Parser)]
#[command(name = "calib-worker")]
#[command(about = "Evaluate one calibration sample", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    args: WorkerArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_worker(&cli.args)?;
    Ok(())
}
