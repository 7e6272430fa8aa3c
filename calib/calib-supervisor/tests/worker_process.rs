//! Worker processes driven through `/bin/sh`.
//!
//! Scripts see the input artifact as `$1` and the output artifact as `$2`.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use std::fs;
use std::time::Duration;

use approx::assert_relative_eq;
use calib_params::{SENTINEL_COST, is_sentinel};
use calib_supervisor::{
    INPUT_FILE, OUTPUT_FILE, ProcessSupervisor, WorkerCommand, WorkerHeader, WorkerStatus,
};

const TIMEOUT: Duration = Duration::from_secs(20);

fn script(body: &str) -> WorkerCommand {
    WorkerCommand::new("/bin/sh").with_args(["-c", body, "worker"])
}

fn header() -> WorkerHeader {
    WorkerHeader::new("/data/meshes", "/data/output", "VenusA_L26")
}

#[test]
fn cost_is_read_from_output() {
    let scratch = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    let outcome = supervisor.run_worker_detailed(
        &script(r#"echo 3.5 > "$2""#),
        &header(),
        &[0.5, 0.5],
        TIMEOUT,
    );

    assert_eq!(outcome.status, WorkerStatus::Completed);
    assert_relative_eq!(outcome.cost, 3.5);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.pid.is_some());
}

#[test]
fn worker_sees_clamped_parameters() {
    let scratch = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    let cost = supervisor.run_worker(
        &script(r#"tail -n 1 "$1" | cut -d ' ' -f 3 > "$2""#),
        &header(),
        &[-3.0, 0.5, 7.0],
        TIMEOUT,
    );
    assert_relative_eq!(cost, 1.0);
}

#[test]
fn fixed_artifacts_follow_the_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::fixed(dir.path());

    let cost = supervisor.run_worker(
        &script(r#"echo 0.25 > "$2""#),
        &header(),
        &[0.1, 0.9],
        TIMEOUT,
    );
    assert_relative_eq!(cost, 0.25);

    let input = fs::read_to_string(dir.path().join(INPUT_FILE)).unwrap();
    let lines: Vec<&str> = input.lines().collect();
    assert_eq!(
        lines,
        ["/data/meshes", "/data/output", "VenusA_L26", "2", "0.1 0.9"]
    );
}

#[test]
fn exit_code_does_not_decide_success() {
    let scratch = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    let outcome = supervisor.run_worker_detailed(
        &script(r#"echo 2.0 > "$2"; exit 3"#),
        &header(),
        &[0.5],
        TIMEOUT,
    );
    assert_eq!(outcome.status, WorkerStatus::Completed);
    assert_eq!(outcome.exit_code, Some(3));
    assert_relative_eq!(outcome.cost, 2.0);
}

#[test]
fn missing_or_malformed_output_is_sentinel() {
    let scratch = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    for body in ["exit 0", r#"echo nope > "$2""#, r#": > "$2""#] {
        let outcome = supervisor.run_worker_detailed(&script(body), &header(), &[0.5], TIMEOUT);
        assert_eq!(outcome.status, WorkerStatus::ProtocolFailure, "{body}");
        assert_relative_eq!(outcome.cost, SENTINEL_COST);
    }
}

#[test]
fn stale_output_is_removed_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(OUTPUT_FILE), "0.5").unwrap();
    let supervisor = ProcessSupervisor::fixed(dir.path());

    let cost = supervisor.run_worker(&script("exit 1"), &header(), &[0.5], TIMEOUT);
    assert!(is_sentinel(cost));
}

#[test]
fn hanging_worker_is_killed_at_deadline() {
    let scratch = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    let outcome = supervisor.run_worker_detailed(
        &script("exec sleep 10"),
        &header(),
        &[0.5],
        Duration::from_millis(100),
    );

    assert_eq!(outcome.status, WorkerStatus::TimedOut);
    assert_relative_eq!(outcome.cost, SENTINEL_COST);
    assert!(outcome.elapsed >= Duration::from_millis(100));
    assert!(outcome.elapsed < Duration::from_secs(2), "{:?}", outcome.elapsed);

    #[cfg(target_os = "linux")]
    {
        let pid = outcome.pid.unwrap();
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }
}

/// True once `pid` has exited, whether or not it has been reaped.
#[cfg(target_os = "linux")]
fn has_exited(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Err(_) => true,
        // The state follows the parenthesised command name.
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with(['Z', 'X'])),
    }
}

#[cfg(target_os = "linux")]
#[test]
fn timeout_kills_processes_the_worker_started() {
    let scratch = tempfile::tempdir().unwrap();
    let side = tempfile::tempdir().unwrap();
    let pidfile = side.path().join("solver.pid");
    let body = format!(r#"sleep 30 & echo $! > "{}"; wait"#, pidfile.display());
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    let outcome =
        supervisor.run_worker_detailed(&script(&body), &header(), &[0.5], Duration::from_millis(300));
    assert_eq!(outcome.status, WorkerStatus::TimedOut);

    let solver: u32 = fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();
    let give_up = std::time::Instant::now() + Duration::from_secs(2);
    while !has_exited(solver) && std::time::Instant::now() < give_up {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(has_exited(solver), "background process {solver} outlived its worker");
}

#[test]
fn missing_program_is_sentinel() {
    let scratch = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    let outcome = supervisor.run_worker_detailed(
        &WorkerCommand::new(scratch.path().join("no-such-worker")),
        &header(),
        &[0.5],
        TIMEOUT,
    );
    assert_eq!(outcome.status, WorkerStatus::SpawnFailed);
    assert!(outcome.pid.is_none());
    assert!(is_sentinel(outcome.cost));
}

#[test]
fn repeated_calls_leave_no_evaluation_directories() {
    let scratch = tempfile::tempdir().unwrap();
    let supervisor = ProcessSupervisor::scoped(scratch.path());

    for i in 0..5 {
        let body = format!(r#"echo {i} > "$2""#);
        let cost = supervisor.run_worker(&script(&body), &header(), &[0.5], TIMEOUT);
        assert_relative_eq!(cost, f64::from(i));
    }
    supervisor.run_worker(&script("exec sleep 10"), &header(), &[0.5], Duration::from_millis(50));

    assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
}
