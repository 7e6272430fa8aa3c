//! Locations of the two protocol artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{SupervisorError, SupervisorResult};

/// File name of the input artifact.
pub const INPUT_FILE: &str = "temp_in.txt";

/// File name of the output artifact.
pub const OUTPUT_FILE: &str = "temp_out.txt";

/// Input and output artifact paths for one worker invocation.
///
/// Scoped paths live in a fresh directory `<scratch>/eval-<id>-XXXX/` that
/// is removed when the value is dropped or [`close`](Self::close)d, so
/// concurrent evaluations never see each other's artifacts. Fixed paths
/// reuse the same two files in a directory across calls.
#[derive(Debug)]
pub struct WorkerPaths {
    input: PathBuf,
    output: PathBuf,
    scope: Option<TempDir>,
}

impl WorkerPaths {
    /// Fresh per-evaluation directory under `scratch`.
    ///
    /// # Errors
    ///
    /// Returns an error if `scratch` cannot be created or written.
    pub fn scoped(scratch: &Path, id: u64) -> SupervisorResult<Self> {
        fs::create_dir_all(scratch).map_err(|e| SupervisorError::io(scratch, e))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("eval-{id}-"))
            .tempdir_in(scratch)
            .map_err(|e| SupervisorError::io(scratch, e))?;
        Ok(Self {
            input: dir.path().join(INPUT_FILE),
            output: dir.path().join(OUTPUT_FILE),
            scope: Some(dir),
        })
    }

    /// Well-known artifact names directly inside `dir`.
    #[must_use]
    pub fn fixed(dir: &Path) -> Self {
        Self {
            input: dir.join(INPUT_FILE),
            output: dir.join(OUTPUT_FILE),
            scope: None,
        }
    }

    /// Input artifact path.
    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Output artifact path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Per-evaluation directory, if scoped.
    #[must_use]
    pub fn scope_dir(&self) -> Option<&Path> {
        self.scope.as_ref().map(TempDir::path)
    }

    /// Remove a leftover output artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists and cannot be removed.
    pub fn clear_output(&self) -> SupervisorResult<()> {
        match fs::remove_file(&self.output) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(SupervisorError::io(&self.output, e))
            }
            _ => Ok(()),
        }
    }

    /// Remove the scoped directory. Fixed paths are left in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn close(self) -> io::Result<()> {
        self.scope.map_or(Ok(()), TempDir::close)
    }
}
