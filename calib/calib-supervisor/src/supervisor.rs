//! Launching, watching and harvesting worker processes.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use calib_params::SENTINEL_COST;
use tracing::{debug, info, warn};

use crate::error::SupervisorResult;
use crate::paths::WorkerPaths;
use crate::protocol::{WorkerHeader, WorkerRequest, read_cost};

/// Default wall-clock budget for one simulation (15 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(900_000);

/// Interval between liveness checks while a worker runs.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Executable plus the arguments placed before the two artifact paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    /// Command running `program <input> <output>`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Insert extra arguments before the artifact paths.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Executable path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Extra arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// On unix the worker leads its own process group so a timeout can
    /// take down anything it started.
    fn spawn(&self, paths: &WorkerPaths) -> io::Result<Child> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(paths.input())
            .arg(paths.output())
            .stdin(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command.spawn()
    }
}

/// How a worker invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// The worker exited and left a parseable cost.
    Completed,
    /// The deadline passed; the worker was killed.
    TimedOut,
    /// The worker could not be started.
    SpawnFailed,
    /// Artifacts could not be written, or the output was missing or malformed.
    ProtocolFailure,
}

/// Full record of one worker invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerOutcome {
    /// Parsed cost, or [`SENTINEL_COST`] unless `status` is `Completed`.
    pub cost: f64,
    /// How the invocation ended.
    pub status: WorkerStatus,
    /// Exit code when the worker exited on its own.
    pub exit_code: Option<i32>,
    /// Process id when the worker was started.
    pub pid: Option<u32>,
    /// Wall-clock time spent in the call.
    pub elapsed: Duration,
}

impl WorkerOutcome {
    fn failed(status: WorkerStatus, pid: Option<u32>, start: Instant) -> Self {
        Self {
            cost: SENTINEL_COST,
            status,
            exit_code: None,
            pid,
            elapsed: start.elapsed(),
        }
    }

    /// True when the worker produced a cost.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == WorkerStatus::Completed
    }
}

#[derive(Debug, Clone)]
enum ArtifactLocation {
    Scoped(PathBuf),
    Fixed(PathBuf),
}

/// Runs one simulation per call in a child process under a deadline.
///
/// Every failure mode (spawn error, timeout, missing or malformed output)
/// maps to [`SENTINEL_COST`]; nothing is raised to the caller. The child
/// handle never outlives the call: timed-out workers are killed and reaped.
///
/// The worker's exit code is logged but not consulted; only the output
/// artifact decides success.
///
/// With [`scoped`](Self::scoped) artifacts, calls are independent and may
/// run concurrently. [`fixed`](Self::fixed) artifacts are shared, so only
/// one call may be in flight.
#[derive(Debug)]
pub struct ProcessSupervisor {
    location: ArtifactLocation,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl ProcessSupervisor {
    /// Supervisor placing artifacts in per-evaluation directories under
    /// `scratch`.
    #[must_use]
    pub fn scoped(scratch: impl Into<PathBuf>) -> Self {
        Self::with_location(ArtifactLocation::Scoped(scratch.into()))
    }

    /// Supervisor reusing `temp_in.txt` and `temp_out.txt` inside `dir`.
    #[must_use]
    pub fn fixed(dir: impl Into<PathBuf>) -> Self {
        Self::with_location(ArtifactLocation::Fixed(dir.into()))
    }

    fn with_location(location: ArtifactLocation) -> Self {
        Self {
            location,
            poll_interval: POLL_INTERVAL,
            next_id: AtomicU64::new(1),
        }
    }

    /// Set the liveness polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    fn paths(&self, id: u64) -> SupervisorResult<WorkerPaths> {
        match &self.location {
            ArtifactLocation::Scoped(scratch) => WorkerPaths::scoped(scratch, id),
            ArtifactLocation::Fixed(dir) => Ok(WorkerPaths::fixed(dir)),
        }
    }

    /// Run the worker and return its cost, or the sentinel on any failure.
    pub fn run_worker(
        &self,
        worker: &WorkerCommand,
        header: &WorkerHeader,
        parameters: &[f64],
        timeout: Duration,
    ) -> f64 {
        self.run_worker_detailed(worker, header, parameters, timeout)
            .cost
    }

    /// Run the worker and report how the invocation ended.
    pub fn run_worker_detailed(
        &self,
        worker: &WorkerCommand,
        header: &WorkerHeader,
        parameters: &[f64],
        timeout: Duration,
    ) -> WorkerOutcome {
        let start = Instant::now();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let paths = match self.prepare(id, header, parameters) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(evaluation = id, error = %e, "failed to prepare worker artifacts");
                return WorkerOutcome::failed(WorkerStatus::ProtocolFailure, None, start);
            }
        };

        let outcome = Self::supervise(id, worker, &paths, timeout, self.poll_interval, start);

        let scope = paths.scope_dir().map(Path::to_path_buf);
        if let Err(e) = paths.close() {
            debug!(evaluation = id, dir = ?scope, error = %e, "failed to remove evaluation directory");
        }
        outcome
    }

    fn prepare(
        &self,
        id: u64,
        header: &WorkerHeader,
        parameters: &[f64],
    ) -> SupervisorResult<WorkerPaths> {
        let paths = self.paths(id)?;
        WorkerRequest::new(header.clone(), parameters).write(paths.input())?;
        paths.clear_output()?;
        Ok(paths)
    }

    fn supervise(
        id: u64,
        worker: &WorkerCommand,
        paths: &WorkerPaths,
        timeout: Duration,
        poll: Duration,
        start: Instant,
    ) -> WorkerOutcome {
        let mut child = match worker.spawn(paths) {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    evaluation = id,
                    program = %worker.program().display(),
                    error = %e,
                    "failed to start worker"
                );
                return WorkerOutcome::failed(WorkerStatus::SpawnFailed, None, start);
            }
        };
        let pid = child.id();
        debug!(evaluation = id, pid, input = %paths.input().display(), "worker started");

        let deadline = Instant::now().checked_add(timeout);
        let status = match wait_until(&mut child, deadline, poll) {
            Ok(Some(status)) => status,
            Ok(None) => {
                terminate(&mut child);
                warn!(
                    evaluation = id,
                    pid,
                    timeout_ms = millis(timeout),
                    "worker timed out and was killed"
                );
                return WorkerOutcome::failed(WorkerStatus::TimedOut, Some(pid), start);
            }
            Err(e) => {
                terminate(&mut child);
                warn!(evaluation = id, pid, error = %e, "lost track of worker");
                return WorkerOutcome::failed(WorkerStatus::ProtocolFailure, Some(pid), start);
            }
        };

        let exit_code = status.code();
        if !status.success() {
            warn!(evaluation = id, pid, ?exit_code, "worker exited abnormally");
        }

        match read_cost(paths.output()) {
            Some(cost) => {
                let elapsed = start.elapsed();
                info!(evaluation = id, pid, cost, elapsed_ms = millis(elapsed), "worker finished");
                WorkerOutcome {
                    cost,
                    status: WorkerStatus::Completed,
                    exit_code,
                    pid: Some(pid),
                    elapsed,
                }
            }
            None => {
                warn!(
                    evaluation = id,
                    pid,
                    output = %paths.output().display(),
                    "worker left no parseable cost"
                );
                WorkerOutcome {
                    exit_code,
                    ..WorkerOutcome::failed(WorkerStatus::ProtocolFailure, Some(pid), start)
                }
            }
        }
    }
}

/// Poll until the child exits or `deadline` passes. `None` waits forever.
fn wait_until(
    child: &mut Child,
    deadline: Option<Instant>,
    poll: Duration,
) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        match deadline {
            Some(deadline) if now >= deadline => return Ok(None),
            Some(deadline) => thread::sleep(poll.min(deadline - now)),
            None => thread::sleep(poll),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Kill the worker's process group, then the worker, and reap. The child
/// may already have exited, so kill errors are not fatal; `wait` releases
/// the process entry either way.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    kill_group(child.id());
    if let Err(e) = child.kill() {
        debug!(pid = child.id(), error = %e, "kill failed");
    }
    if let Err(e) = child.wait() {
        warn!(pid = child.id(), error = %e, "failed to reap worker");
    }
}

/// SIGKILL every process in the group led by `pid`, including solvers the
/// worker spawned.
#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(pid, error = %e, "killpg failed");
    }
}
