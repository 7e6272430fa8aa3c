//! The structural solver seam.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use calib_material::LameParameters;
use calib_supervisor::POLL_INTERVAL;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::device::DeviceModel;
use crate::model_set::ModelSet;

/// Outcome of one deployment simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveStatus {
    /// The solver ran to the stop time and wrote its results.
    Success,
    /// The solver stopped early; the reason is for logs only.
    Failed(String),
}

impl SolveStatus {
    /// True for [`SolveStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// An external structural solver.
///
/// The solver receives a fresh model set and writes its result surfaces
/// under `output_root`. It is opaque to the harness: only the status and
/// the files it leaves behind are observed.
pub trait StructuralSolver {
    /// Run one deployment simulation.
    fn solve(&mut self, models: &ModelSet, output_root: &Path) -> SolveStatus;
}

impl<F> StructuralSolver for F
where
    F: FnMut(&ModelSet, &Path) -> SolveStatus,
{
    fn solve(&mut self, models: &ModelSet, output_root: &Path) -> SolveStatus {
        self(models, output_root)
    }
}

/// Time integration settings handed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Simulated time at which deployment ends.
    pub stop_time: f64,
    /// Steps between surface outputs.
    pub output_stride: u32,
    /// Contact stiffness scale.
    pub collision_coefficient: f64,
    /// Direction the delivery sheath is withdrawn along.
    pub sheathing_axis: [f64; 3],
    /// Device nodes below this fraction of its height are held.
    pub anchor_fraction: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            stop_time: 14.0,
            output_stride: 20,
            collision_coefficient: 30.0,
            sheathing_axis: [0.0, 1.0, 0.0],
            anchor_fraction: 0.01,
        }
    }
}

/// Job description written for [`CommandSolver`].
#[derive(Debug, Serialize)]
struct SolverJob<'a> {
    device: &'a DeviceModel,
    tissue_mesh: &'a Path,
    expanded_tissue_mesh: Option<&'a Path>,
    boundary_nodes: &'a [usize],
    materials: &'a [LameParameters],
    output_root: &'a Path,
    settings: SolverSettings,
}

/// Runs a solver executable as `program [args..] <job.json>`.
///
/// The job file lists the device files, the tissue deck, the per-element
/// Lamé parameters and the integration settings. A zero exit status is
/// success. With a timeout, a solver still running at the deadline is
/// killed and the solve fails.
#[derive(Debug, Clone)]
pub struct CommandSolver {
    program: PathBuf,
    args: Vec<String>,
    settings: SolverSettings,
    timeout: Option<Duration>,
}

impl CommandSolver {
    /// Job file name inside the output root.
    pub const JOB_FILE: &'static str = "solver_job.json";

    /// Solver command with default settings.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            settings: SolverSettings::default(),
            timeout: None,
        }
    }

    /// Insert arguments before the job path.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Replace the integration settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Kill the solver if it runs longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn write_job(&self, models: &ModelSet, output_root: &Path) -> Result<PathBuf, String> {
        fs::create_dir_all(output_root).map_err(|e| format!("{}: {e}", output_root.display()))?;
        let job = SolverJob {
            device: &models.device,
            tissue_mesh: &models.tissue_mesh,
            expanded_tissue_mesh: models.expanded_tissue_mesh.as_deref(),
            boundary_nodes: &models.boundary_nodes,
            materials: models.tissue.materials(),
            output_root,
            settings: self.settings,
        };
        let path = output_root.join(Self::JOB_FILE);
        let text = serde_json::to_string(&job).map_err(|e| e.to_string())?;
        fs::write(&path, text).map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(path)
    }
}

impl StructuralSolver for CommandSolver {
    fn solve(&mut self, models: &ModelSet, output_root: &Path) -> SolveStatus {
        let job = match self.write_job(models, output_root) {
            Ok(job) => job,
            Err(reason) => return SolveStatus::Failed(format!("cannot write job: {reason}")),
        };
        debug!(program = %self.program.display(), job = %job.display(), "Starting solver");

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&job)
            .stdin(Stdio::null())
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                return SolveStatus::Failed(format!("cannot start {}: {e}", self.program.display()));
            }
        };

        let deadline = self.timeout.map(|t| Instant::now() + t);
        match wait_until(&mut child, deadline) {
            Ok(Some(status)) if status.success() => SolveStatus::Success,
            Ok(Some(status)) => {
                warn!(code = ?status.code(), "Solver exited abnormally");
                SolveStatus::Failed(format!("solver exited with {status}"))
            }
            Ok(None) => {
                warn!(pid = child.id(), timeout = ?self.timeout, "Solver timed out; killing");
                kill(&mut child);
                SolveStatus::Failed("solver timed out".into())
            }
            Err(e) => {
                kill(&mut child);
                SolveStatus::Failed(format!("cannot wait for solver: {e}"))
            }
        }
    }
}

fn wait_until(child: &mut Child, deadline: Option<Instant>) -> std::io::Result<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(pid = child.id(), error = %e, "kill failed");
    }
    if let Err(e) = child.wait() {
        warn!(pid = child.id(), error = %e, "failed to reap solver");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model_set::tests::builder;

    #[test]
    fn closures_are_solvers() {
        let dir = tempfile::tempdir().unwrap();
        let set = builder(dir.path()).build().unwrap();

        let mut calls = 0;
        let mut solver = |models: &ModelSet, _: &Path| {
            calls += 1;
            if models.boundary_nodes.is_empty() {
                SolveStatus::Failed("unconstrained".into())
            } else {
                SolveStatus::Success
            }
        };
        assert!(solver.solve(&set, dir.path()).is_success());
        assert_eq!(calls, 1);
    }

    #[cfg(unix)]
    #[test]
    fn command_solver_writes_job_and_reads_status() {
        let dir = tempfile::tempdir().unwrap();
        let set = builder(dir.path()).build().unwrap();
        let out = dir.path().join("run");

        let mut ok = CommandSolver::new("/bin/sh").with_args(vec![
            "-c".into(),
            r#"test -s "$1""#.into(),
            "solver".into(),
        ]);
        assert_eq!(ok.solve(&set, &out), SolveStatus::Success);

        let job: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(CommandSolver::JOB_FILE)).unwrap())
                .unwrap();
        assert_eq!(job["materials"].as_array().unwrap().len(), 2);
        assert_eq!(job["boundary_nodes"], serde_json::json!([0, 1, 4]));
        assert_eq!(job["settings"]["output_stride"], 20);

        let mut failing = CommandSolver::new("/bin/sh").with_args(vec!["-c".into(), "exit 2".into()]);
        assert!(!failing.solve(&set, &out).is_success());

        let mut missing = CommandSolver::new(dir.path().join("no-solver"));
        assert!(matches!(missing.solve(&set, &out), SolveStatus::Failed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn hanging_solver_fails_at_the_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let set = builder(dir.path()).build().unwrap();

        let mut solver = CommandSolver::new("/bin/sh")
            .with_args(vec!["-c".into(), "exec sleep 30".into(), "solver".into()])
            .with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        let status = solver.solve(&set, &dir.path().join("run"));

        assert_eq!(status, SolveStatus::Failed("solver timed out".into()));
        assert!(start.elapsed() < Duration::from_secs(5), "{:?}", start.elapsed());
    }
}
