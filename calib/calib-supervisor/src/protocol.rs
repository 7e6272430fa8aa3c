//! Line-oriented worker protocol.
//!
//! Input artifact, written by the host and read by the worker:
//!
//! ```text
//! <mesh root>
//! <output root>
//! <variant tag>
//! <N>
//! <v1> <v2> ... <vN>
//! ```
//!
//! Output artifact, written by the worker: a single real number.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use calib_params::clamp_unit;

use crate::error::{ProtocolError, SupervisorError, SupervisorResult};

/// Environment handed to every worker invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHeader {
    /// Directory holding the patient meshes.
    pub mesh_root: PathBuf,
    /// Directory the solver writes into.
    pub output_root: PathBuf,
    /// Device variant tag, e.g. `VenusA_L26`.
    pub variant: String,
}

impl WorkerHeader {
    /// Create a header.
    #[must_use]
    pub fn new(
        mesh_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            mesh_root: mesh_root.into(),
            output_root: output_root.into(),
            variant: variant.into(),
        }
    }
}

/// Parsed or to-be-written input artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRequest {
    /// Environment lines.
    pub header: WorkerHeader,
    /// Normalized parameter values.
    pub parameters: Vec<f64>,
}

impl WorkerRequest {
    /// Build a request, clamping every value into `[0, 1]`.
    #[must_use]
    pub fn new(header: WorkerHeader, parameters: &[f64]) -> Self {
        Self {
            header,
            parameters: parameters.iter().copied().map(clamp_unit).collect(),
        }
    }

    /// Render the artifact text.
    ///
    /// Values use the shortest representation that parses back exactly.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.header.mesh_root.display());
        let _ = writeln!(out, "{}", self.header.output_root.display());
        let _ = writeln!(out, "{}", self.header.variant);
        let _ = writeln!(out, "{}", self.parameters.len());
        let values: Vec<String> = self.parameters.iter().map(f64::to_string).collect();
        let _ = writeln!(out, "{}", values.join(" "));
        out
    }

    /// Parse artifact text.
    ///
    /// Header lines are taken verbatim (minus a trailing `\r`), so paths may
    /// contain spaces. The value line may be absent when the count is zero.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for missing lines, a bad count, a
    /// non-finite or unparsable value, or a count mismatch.
    ///
    /// # Example
    ///
    /// ```
    /// use calib_supervisor::WorkerRequest;
    ///
    /// let text = "/data/meshes\n/data/out\nVenusA_L26\n2\n0.25 0.5\n";
    /// let request = WorkerRequest::parse(text).unwrap();
    /// assert_eq!(request.header.variant, "VenusA_L26");
    /// assert_eq!(request.parameters, vec![0.25, 0.5]);
    /// ```
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let mut lines = text.lines().map(|l| l.strip_suffix('\r').unwrap_or(l));
        let mut next = |what: &'static str| lines.next().ok_or(ProtocolError::MissingLine(what));

        let mesh_root = next("mesh root")?;
        let output_root = next("output root")?;
        let variant = next("variant")?.trim();
        let count_line = next("parameter count")?.trim();
        let declared: usize = count_line
            .parse()
            .map_err(|_| ProtocolError::BadCount(count_line.to_owned()))?;

        let value_line = match next("parameter values") {
            Ok(line) => line,
            Err(_) if declared == 0 => "",
            Err(e) => return Err(e),
        };

        let parameters = value_line
            .split_whitespace()
            .enumerate()
            .map(|(index, token)| match token.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(ProtocolError::BadValue {
                    index,
                    token: token.to_owned(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if parameters.len() != declared {
            return Err(ProtocolError::CountMismatch {
                declared,
                found: parameters.len(),
            });
        }

        Ok(Self {
            header: WorkerHeader::new(mesh_root, output_root, variant),
            parameters,
        })
    }

    /// Read and parse an input artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> SupervisorResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| SupervisorError::io(path, e))?;
        Ok(Self::parse(&text)?)
    }

    /// Write the input artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> SupervisorResult<()> {
        fs::write(path, self.render()).map_err(|e| SupervisorError::io(path, e))
    }
}

/// Parse the cost from output artifact text.
///
/// The first whitespace-delimited token must be a finite real number.
#[must_use]
pub fn parse_cost(text: &str) -> Option<f64> {
    text.split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Read the cost from an output artifact; `None` if absent or malformed.
#[must_use]
pub fn read_cost(path: &Path) -> Option<f64> {
    fs::read_to_string(path).ok().as_deref().and_then(parse_cost)
}

/// Write a cost as the output artifact.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_cost(path: &Path, cost: f64) -> SupervisorResult<()> {
    fs::write(path, format!("{cost}\n")).map_err(|e| SupervisorError::io(path, e))
}
