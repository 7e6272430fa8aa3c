//! Calibrate regional vessel stiffness against deployed device geometry.

use anyhow::Result;
use calib_cli::{OptimizeArgs, init_tracing, run_batch};
use clap::Parser;

/// Vessel stiffness calibration host
///
/// Runs the configured optimizer for each run configuration. Evaluations
/// are delegated to `calib-worker` processes unless `--in-process` is set.
#[derive(Parser)]
#[command(name = "calib-optimize")]
#[command(about = "Calibrate regional vessel stiffness", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    args: OptimizeArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    for report in run_batch(&cli.args)? {
        let cost = report.best.as_ref().map_or(f64::INFINITY, |b| b.cost);
        println!(
            "best cost {cost} after {} evaluations ({})",
            report.evaluations, report.stop
        );
        if let Some(physical) = &report.best_physical {
            println!("best parameters {physical:?}");
        }
    }
    Ok(())
}
