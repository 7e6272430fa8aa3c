//! Where the expensive part of an evaluation runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use calib_discrepancy::GeometricDiscrepancyEngine;
use calib_material::{MODULUS_ZONE, MaterialMapper, export_modulus};
use calib_params::PropertyMap;
use calib_supervisor::{ProcessSupervisor, WorkerCommand, WorkerHeader, WorkerStatus};
use tracing::{debug, info, warn};

use crate::config::{CalibrationConfig, MODULUS_EXPORT_FILE};
use crate::error::{ConfigError, EvalError, EvalResult};
use crate::model_set::ModelSetBuilder;
use crate::solver::{CommandSolver, SolveStatus, StructuralSolver};
use crate::stage::{EvaluationFailure, EvaluationStage};

/// One candidate as seen by a backend.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    /// Evaluation number, starting at 1.
    pub iteration: u64,
    /// Normalized values, clamped to `[0, 1]`.
    pub normalized: &'a [f64],
    /// Physical values in parameter order.
    pub physical: &'a [f64],
    /// Region properties derived from `physical`.
    pub properties: &'a PropertyMap,
}

/// Turns a sample into a cost.
///
/// Backends report failures instead of sentinel costs so the evaluator can
/// log which stage failed; it converts them to the sentinel.
pub trait EvaluationBackend {
    /// Run the simulation for `sample` and score it.
    ///
    /// # Errors
    ///
    /// Returns the stage that could not be completed.
    fn evaluate(&mut self, sample: &Sample<'_>) -> Result<f64, EvaluationFailure>;
}

/// Builds, solves and scores in the calling process.
///
/// This is what a worker process runs; the host can also use it directly
/// when process isolation is not needed.
pub struct InProcessBackend {
    builder: ModelSetBuilder,
    mapper: MaterialMapper,
    search_radius: f64,
    solver: Box<dyn StructuralSolver>,
    engine: GeometricDiscrepancyEngine,
    output_root: PathBuf,
    simulated_surface: PathBuf,
    modulus_export: Option<PathBuf>,
}

impl std::fmt::Debug for InProcessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessBackend")
            .field("tissue_mesh", &self.builder.tissue_mesh())
            .field("regions", &self.mapper.regions().len())
            .field("search_radius", &self.search_radius)
            .field("output_root", &self.output_root)
            .field("simulated_surface", &self.simulated_surface)
            .finish_non_exhaustive()
    }
}

impl InProcessBackend {
    /// Backend from parts. `mapper` must be initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if a region surface cannot be loaded.
    pub fn new(
        builder: ModelSetBuilder,
        mut mapper: MaterialMapper,
        solver: Box<dyn StructuralSolver>,
        engine: GeometricDiscrepancyEngine,
        output_root: impl Into<PathBuf>,
        simulated_surface: impl Into<PathBuf>,
    ) -> EvalResult<Self> {
        mapper.initialize()?;
        Ok(Self {
            builder,
            mapper,
            search_radius: calib_material::DEFAULT_SEARCH_RADIUS,
            solver,
            engine,
            output_root: output_root.into(),
            simulated_surface: simulated_surface.into(),
            modulus_export: None,
        })
    }

    /// Set the region search radius.
    #[must_use]
    pub const fn with_search_radius(mut self, radius: f64) -> Self {
        self.search_radius = radius;
        self
    }

    /// Write the per-node modulus to `path` on every evaluation.
    #[must_use]
    pub fn with_modulus_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.modulus_export = Some(path.into());
        self
    }

    /// Backend for a configuration, running its solver command.
    ///
    /// # Errors
    ///
    /// Returns an error if no solver is configured, the variant is unknown,
    /// or a region surface cannot be loaded.
    pub fn from_config(config: &CalibrationConfig) -> EvalResult<Self> {
        let solver_config = config.solver.as_ref().ok_or_else(|| {
            ConfigError::Invalid("in-process evaluation needs a solver".into())
        })?;
        let timeout_ms = solver_config.timeout_ms.unwrap_or(config.worker.timeout_ms);
        let solver = CommandSolver::new(&solver_config.program)
            .with_args(solver_config.args.clone())
            .with_timeout(Duration::from_millis(timeout_ms));
        Self::from_config_with_solver(config, Box::new(solver))
    }

    /// Backend for a configuration with an explicit solver.
    ///
    /// # Errors
    ///
    /// Returns an error if the variant is unknown or a region surface
    /// cannot be loaded.
    pub fn from_config_with_solver(
        config: &CalibrationConfig,
        solver: Box<dyn StructuralSolver>,
    ) -> EvalResult<Self> {
        let builder = ModelSetBuilder::from_config(config)?;
        let backend = Self::new(
            builder,
            config.material_mapper()?,
            solver,
            GeometricDiscrepancyEngine::new(config.scoring_mode()),
            &config.output_root,
            config.simulated_surface(),
        )?
        .with_search_radius(config.search_radius);
        Ok(if config.export_modulus {
            backend.with_modulus_export(config.output_path(Path::new(MODULUS_EXPORT_FILE)))
        } else {
            backend
        })
    }

    fn export(&self, tissue: &calib_material::TissueModel) {
        let Some(path) = &self.modulus_export else {
            return;
        };
        match export_modulus(tissue, path, MODULUS_ZONE) {
            Ok(()) => debug!(path = %path.display(), "Exported nodal modulus"),
            Err(e) => warn!(error = %e, "Modulus export failed"),
        }
    }

    /// Remove the previous result surface so a failed run cannot be scored
    /// against stale geometry.
    fn clear_previous_result(&self) -> EvalResult<()> {
        match std::fs::remove_file(&self.simulated_surface) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(EvalError::write(&self.simulated_surface, e))
            }
            _ => Ok(()),
        }
    }
}

impl EvaluationBackend for InProcessBackend {
    fn evaluate(&mut self, sample: &Sample<'_>) -> Result<f64, EvaluationFailure> {
        let fail = |stage, e: &dyn std::fmt::Display| EvaluationFailure::new(stage, e.to_string());

        let mut models = self
            .builder
            .build()
            .map_err(|e| fail(EvaluationStage::ModelBuilt, &e))?;
        debug!(iteration = sample.iteration, stage = %EvaluationStage::ModelBuilt);

        let report = self
            .mapper
            .apply_materials(&mut models.tissue, sample.properties, self.search_radius)
            .map_err(|e| fail(EvaluationStage::MaterialsApplied, &e))?;
        debug!(
            iteration = sample.iteration,
            stage = %EvaluationStage::MaterialsApplied,
            assigned = report.assigned_elements,
            eligible = report.eligible_elements
        );
        self.export(&models.tissue);

        self.clear_previous_result()
            .map_err(|e| fail(EvaluationStage::SolverRun, &e))?;
        match self.solver.solve(&models, &self.output_root) {
            SolveStatus::Success => {}
            SolveStatus::Failed(reason) => {
                return Err(EvaluationFailure::new(EvaluationStage::SolverRun, reason));
            }
        }
        debug!(iteration = sample.iteration, stage = %EvaluationStage::SolverRun);

        let report = self.engine.evaluate(&self.simulated_surface);
        let cost = report.cost();
        debug!(iteration = sample.iteration, stage = %EvaluationStage::Scored, cost);
        Ok(cost)
    }
}

/// Runs every evaluation in a supervised worker process.
#[derive(Debug)]
pub struct WorkerBackend {
    supervisor: ProcessSupervisor,
    command: WorkerCommand,
    header: WorkerHeader,
    timeout: Duration,
}

impl WorkerBackend {
    /// Backend launching `command` through `supervisor`.
    #[must_use]
    pub const fn new(
        supervisor: ProcessSupervisor,
        command: WorkerCommand,
        header: WorkerHeader,
        timeout: Duration,
    ) -> Self {
        Self {
            supervisor,
            command,
            header,
            timeout,
        }
    }

    /// Backend with scoped artifacts under the configured scratch directory.
    #[must_use]
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self::new(
            ProcessSupervisor::scoped(config.scratch_dir()),
            config.worker_command(),
            config.worker_header(),
            Duration::from_millis(config.worker.timeout_ms),
        )
    }
}

impl EvaluationBackend for WorkerBackend {
    fn evaluate(&mut self, sample: &Sample<'_>) -> Result<f64, EvaluationFailure> {
        let outcome = self.supervisor.run_worker_detailed(
            &self.command,
            &self.header,
            sample.normalized,
            self.timeout,
        );
        match outcome.status {
            WorkerStatus::Completed => {
                info!(
                    iteration = sample.iteration,
                    pid = outcome.pid,
                    elapsed_s = outcome.elapsed.as_secs_f64(),
                    cost = outcome.cost,
                    "Worker evaluation finished"
                );
                Ok(outcome.cost)
            }
            status => Err(EvaluationFailure::new(
                EvaluationStage::SolverRun,
                format!("worker {status:?} after {:.1}s", outcome.elapsed.as_secs_f64()),
            )),
        }
    }
}
