//! The host side: one optimization per configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use calib_driver::{DriverReport, OptimizationDriver};
use calib_eval::{
    BestTracker, CalibrationConfig, ConfigError, DirectorySnapshot, EngineKind, EvalError,
    EvaluationBackend, InProcessBackend, IterationLog, SimulationEvaluator, WorkerBackend,
};
use clap::{Args, ValueEnum};
use tracing::{error, info, warn};

/// Report file name, relative to the output root.
pub const DRIVER_REPORT_FILE: &str = "driver_report.json";

/// Engine choice on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    /// Separable CMA-ES.
    Cmaes,
    /// Latin hypercube design plus local search.
    Lhs,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Cmaes => Self::Cmaes,
            EngineArg::Lhs => Self::Lhs,
        }
    }
}

/// Arguments of `calib-optimize`.
#[derive(Debug, Clone, Default, Args)]
pub struct OptimizeArgs {
    /// Run configurations, one optimization each.
    #[arg(long = "config", required = true, num_args = 1..)]
    pub configs: Vec<PathBuf>,

    /// Override the configured engine.
    #[arg(long, value_enum)]
    pub engine: Option<EngineArg>,

    /// Override the evaluation ceiling.
    #[arg(long)]
    pub max_evaluations: Option<usize>,

    /// Override the generation ceiling.
    #[arg(long)]
    pub max_generations: Option<usize>,

    /// Override the random seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Evaluate in this process with the configured solver instead of
    /// spawning workers.
    #[arg(long)]
    pub in_process: bool,
}

impl OptimizeArgs {
    fn apply(&self, config: &mut CalibrationConfig) {
        if let Some(engine) = self.engine {
            config.optimizer.engine = engine.into();
        }
        if let Some(max) = self.max_evaluations {
            config.optimizer.max_evaluations = Some(max);
        }
        if let Some(max) = self.max_generations {
            config.optimizer.max_generations = Some(max);
        }
        if let Some(seed) = self.seed {
            config.optimizer.seed = seed;
        }
    }
}

/// Run every configuration in `args`, skipping those that are invalid.
///
/// Returns the reports of the runs that completed, in order. A missing
/// dataset, mesh or executable stops the whole batch.
///
/// # Errors
///
/// Returns an error if an input is missing, a run fails for a reason
/// other than its configuration, or no configuration could be run at all.
pub fn run_batch(args: &OptimizeArgs) -> Result<Vec<DriverReport>> {
    let mut reports = Vec::with_capacity(args.configs.len());
    for path in &args.configs {
        match optimize_config(path, args) {
            Ok(report) => reports.push(report),
            Err(err) if is_startup_error(&err) => {
                error!(config = %path.display(), error = %err, "Aborting batch");
                return Err(err.context(format!("cannot start {}", path.display())));
            }
            Err(err) if is_configuration_error(&err) => {
                error!(config = %path.display(), error = %err, "Skipping configuration");
            }
            Err(err) => return Err(err.context(format!("optimizing {}", path.display()))),
        }
    }
    if reports.is_empty() {
        bail!("none of the {} configurations could be run", args.configs.len());
    }
    info!(completed = reports.len(), requested = args.configs.len(), "Batch finished");
    Ok(reports)
}

/// Load, validate and optimize one configuration.
///
/// When `worker.args` is empty, workers are launched as
/// `<program> --config <path> <input> <output>`. The report is written to
/// [`DRIVER_REPORT_FILE`] under the output root.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, one of its inputs is
/// missing, the iteration log or in-process backend cannot be set up, the engine rejects its settings,
/// or the report cannot be written.
pub fn optimize_config(path: &Path, args: &OptimizeArgs) -> Result<DriverReport> {
    let mut config = CalibrationConfig::load(path)?;
    args.apply(&mut config);
    config.validate()?;
    if config.worker.args.is_empty() {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        config.worker.args = vec!["--config".into(), absolute.to_string_lossy().into_owned()];
    }
    config.check_inputs(args.in_process)?;
    info!(
        config = %path.display(),
        output_root = %config.output_root.display(),
        variant = %config.variant,
        parameters = config.parameters.len(),
        in_process = args.in_process,
        "Starting calibration"
    );

    let report = if args.in_process {
        run_with(&config, InProcessBackend::from_config(&config)?)?
    } else {
        run_with(&config, WorkerBackend::from_config(&config))?
    };

    let report_path = config.output_path(Path::new(DRIVER_REPORT_FILE));
    let json = serde_json::to_string_pretty(&report).context("serializing driver report")?;
    fs::write(&report_path, json)
        .with_context(|| format!("writing {}", report_path.display()))?;

    match (&report.best, &report.best_physical) {
        (Some(best), Some(physical)) => info!(
            cost = best.cost,
            parameters = ?physical,
            evaluations = report.evaluations,
            stop = %report.stop,
            "Calibration finished"
        ),
        _ => warn!(
            evaluations = report.evaluations,
            stop = %report.stop,
            "Calibration finished without a finite cost"
        ),
    }
    Ok(report)
}

fn run_with<B: EvaluationBackend>(config: &CalibrationConfig, backend: B) -> Result<DriverReport> {
    let space = config.parameter_space()?;
    let log = IterationLog::open(config.log_file(), space.names())?;
    let mut evaluator =
        SimulationEvaluator::new(space.clone(), backend, log, BestTracker::from(config.best))
            .with_snapshot(DirectorySnapshot::under(&config.output_root));
    let report = OptimizationDriver::from_config(&config.optimizer, space)
        .run_configured(&config.optimizer, &mut evaluator)?;
    Ok(report)
}

fn is_startup_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConfigError>().is_some_and(ConfigError::is_fatal)
}

fn is_configuration_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConfigError>().is_some()
        || matches!(err.downcast_ref::<EvalError>(), Some(EvalError::Config(_)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, worker: serde_json::Value) -> PathBuf {
        let meshes = dir.join("meshes");
        fs::create_dir_all(&meshes).unwrap();
        fs::write(meshes.join("truth.stl"), "solid truth\nendsolid truth\n").unwrap();
        fs::write(meshes.join("vessel.inp"), "*NODE\n").unwrap();
        for region in calib_eval::default_regions() {
            fs::write(meshes.join(&region.surface), "solid r\nendsolid r\n").unwrap();
        }
        let config = serde_json::json!({
            "mesh_root": meshes,
            "output_root": dir.join("out"),
            "tissue_mesh": "vessel.inp",
            "scoring": { "mode": "registration", "truth_surface": "truth.stl" },
            "worker": worker,
            "optimizer": { "engine": "lhs", "max_evaluations": 4 }
        });
        let path = dir.join("run.json");
        fs::write(&path, config.to_string()).unwrap();
        path
    }

    fn current_exe_worker() -> serde_json::Value {
        serde_json::json!({ "program": std::env::current_exe().unwrap() })
    }

    #[test]
    fn overrides_replace_optimizer_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), current_exe_worker());
        let mut config = CalibrationConfig::load(&path).unwrap();
        let args = OptimizeArgs {
            configs: vec![path],
            engine: Some(EngineArg::Cmaes),
            max_evaluations: Some(10),
            seed: Some(42),
            ..OptimizeArgs::default()
        };
        args.apply(&mut config);
        assert_eq!(config.optimizer.engine, EngineKind::Cmaes);
        assert_eq!(config.optimizer.max_evaluations, Some(10));
        assert_eq!(config.optimizer.max_generations, None);
        assert_eq!(config.optimizer.seed, 42);
    }

    #[test]
    fn invalid_configurations_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let args = OptimizeArgs {
            configs: vec![dir.path().join("missing.json")],
            ..OptimizeArgs::default()
        };
        let err = optimize_config(&args.configs[0], &args).unwrap_err();
        assert!(is_configuration_error(&err));

        let err = run_batch(&args).unwrap_err();
        assert!(err.to_string().contains("none of the 1"));
    }

    #[test]
    fn in_process_without_solver_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), current_exe_worker());
        let args = OptimizeArgs {
            configs: vec![path.clone()],
            in_process: true,
            ..OptimizeArgs::default()
        };
        let err = optimize_config(&path, &args).unwrap_err();
        assert!(is_configuration_error(&err), "{err:#}");
        assert!(!is_startup_error(&err));
    }

    #[test]
    fn missing_inputs_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        let config = serde_json::json!({
            "mesh_root": dir.path().join("no-meshes"),
            "output_root": dir.path().join("broken-out"),
            "tissue_mesh": "vessel.inp",
            "scoring": { "mode": "slices", "targets": [{ "height": 1.0, "area": 2.0 }] },
            "worker": { "program": dir.path().join("no-worker") },
            "optimizer": { "engine": "lhs", "max_evaluations": 3 }
        });
        fs::write(&broken, config.to_string()).unwrap();

        let good_dir = tempfile::tempdir().unwrap();
        let good = write_config(good_dir.path(), current_exe_worker());
        let args = OptimizeArgs {
            configs: vec![broken.clone(), good],
            ..OptimizeArgs::default()
        };

        let err = run_batch(&args).unwrap_err();
        assert!(is_startup_error(&err), "{err:#}");
        assert!(err.to_string().contains("broken.json"));
        assert!(!dir.path().join("broken-out").exists());
        assert!(!good_dir.path().join("out").exists());

        // A present root with a missing worker is just as fatal.
        let meshes = write_config(dir.path(), serde_json::json!({ "program": "no-such-calib-worker" }));
        let err = optimize_config(&meshes, &OptimizeArgs::default()).unwrap_err();
        assert!(is_startup_error(&err), "{err:#}");
        assert!(!dir.path().join("out").exists());
    }

    #[cfg(unix)]
    #[test]
    fn batch_runs_workers_and_writes_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let worker = serde_json::json!({
            "program": "/bin/sh",
            "args": ["-c", r#"echo 0.5 > "$2""#, "worker"],
            "scratch_dir": "scratch"
        });
        let good = write_config(dir.path(), worker);
        let args = OptimizeArgs {
            configs: vec![dir.path().join("missing.json"), good],
            ..OptimizeArgs::default()
        };

        let reports = run_batch(&args).unwrap();

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.evaluations, 4);
        assert!((report.best.as_ref().unwrap().cost - 0.5).abs() < f64::EPSILON);

        let out = dir.path().join("out");
        let saved: DriverReport =
            serde_json::from_str(&fs::read_to_string(out.join(DRIVER_REPORT_FILE)).unwrap())
                .unwrap();
        assert_eq!(&saved, report);
        let log = fs::read_to_string(out.join("optimization_log.csv")).unwrap();
        assert_eq!(log.lines().count(), 5);
    }
}
