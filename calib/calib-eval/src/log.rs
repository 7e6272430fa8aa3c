//! Append-only iteration log.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{EvalError, EvalResult};

/// CSV log with one row per evaluation.
///
/// The header `Iteration,<names..>,Cost` is written only when the file is
/// absent or empty, so a resumed run keeps appending to the same file and
/// [`IterationLog::last_iteration`] tells it where numbering left off.
/// Rows are never rewritten. One writer at a time.
///
/// # Example
///
/// ```
/// use calib_eval::IterationLog;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("log.csv");
///
/// let log = IterationLog::open(&path, ["Aorta_E"]).unwrap();
/// log.append(1, &[5.05e6], 0.75).unwrap();
///
/// let text = std::fs::read_to_string(&path).unwrap();
/// assert_eq!(text, "Iteration,Aorta_E,Cost\n1,5050000.000000,0.75\n");
/// ```
#[derive(Debug, Clone)]
pub struct IterationLog {
    path: PathBuf,
    last_iteration: u64,
}

impl IterationLog {
    /// Open `path`, creating it and its header if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be created, or
    /// an existing log cannot be read.
    pub fn open<I, S>(path: impl Into<PathBuf>, names: I) -> EvalResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EvalError::write(parent, e))?;
        }

        let needs_header = fs::metadata(&path).map_or(true, |m| m.len() == 0);
        let last_iteration = if needs_header {
            0
        } else {
            let text = fs::read_to_string(&path).map_err(|e| EvalError::read(&path, e))?;
            last_logged_iteration(&text)
        };
        if needs_header {
            let mut header = String::from("Iteration,");
            for name in names {
                header.push_str(name.as_ref());
                header.push(',');
            }
            header.push_str("Cost\n");
            append_text(&path, &header)?;
        }
        Ok(Self {
            path,
            last_iteration,
        })
    }

    /// Log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest iteration number already in the file when it was opened;
    /// zero for a new log.
    #[must_use]
    pub const fn last_iteration(&self) -> u64 {
        self.last_iteration
    }

    /// Append one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn append(&self, iteration: u64, physical: &[f64], cost: f64) -> EvalResult<()> {
        append_text(&self.path, &format_row(iteration, physical, cost))
    }
}

/// `<iteration>,<value:.6>,...,<cost>` plus newline.
#[must_use]
pub fn format_row(iteration: u64, physical: &[f64], cost: f64) -> String {
    let mut row = format!("{iteration},");
    for value in physical {
        let _ = write!(row, "{value:.6},");
    }
    let _ = writeln!(row, "{cost}");
    row
}

/// Largest leading iteration number among the data rows. Rows that do not
/// start with a number still count, so numbering never repeats.
fn last_logged_iteration(text: &str) -> u64 {
    let rows: Vec<&str> = text.lines().skip(1).filter(|l| !l.trim().is_empty()).collect();
    let numbered = rows
        .iter()
        .filter_map(|row| row.split(',').next()?.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    numbered.max(u64::try_from(rows.len()).unwrap_or(u64::MAX))
}

fn append_text(path: &Path, text: &str) -> EvalResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EvalError::write(path, e))?;
    file.write_all(text.as_bytes())
        .map_err(|e| EvalError::write(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn row_format() {
        assert_eq!(format_row(3, &[0.1e6, 40e6], 12.5), "3,100000.000000,40000000.000000,12.5\n");
        assert_eq!(format_row(4, &[], 1e9), "4,1000000000\n");
    }

    #[test]
    fn header_is_written_once_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.csv");

        let first = IterationLog::open(&path, ["A", "B"]).unwrap();
        first.append(1, &[1.0, 2.0], 0.5).unwrap();

        let second = IterationLog::open(&path, ["A", "B"]).unwrap();
        second.append(2, &[3.0, 4.0], 0.25).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "Iteration,A,B,Cost",
                "1,1.000000,2.000000,0.5",
                "2,3.000000,4.000000,0.25"
            ]
        );
    }

    #[test]
    fn reopening_reports_where_numbering_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let fresh = IterationLog::open(&path, ["A"]).unwrap();
        assert_eq!(fresh.last_iteration(), 0);
        for i in 1..=3 {
            fresh.append(i, &[1.0], 0.5).unwrap();
        }

        assert_eq!(IterationLog::open(&path, ["A"]).unwrap().last_iteration(), 3);
    }

    #[test]
    fn last_iteration_survives_odd_rows() {
        assert_eq!(last_logged_iteration("Iteration,A,Cost\n"), 0);
        assert_eq!(last_logged_iteration("Iteration,A,Cost\n7,1.0,0.5\n\n"), 7);
        assert_eq!(last_logged_iteration("Iteration,A,Cost\nx,1,2\ny,1,2\n"), 2);
    }

    #[test]
    fn empty_file_gets_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        fs::write(&path, "").unwrap();
        IterationLog::open(&path, ["X"]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Iteration,X,Cost\n");
    }
}
