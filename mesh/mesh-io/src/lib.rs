//! Mesh file I/O for the calibration workspace.
//!
//! Surfaces:
//!
//! - **STL** - binary and ASCII, welded on load
//! - **OBJ** - positions and faces, fan-triangulated
//!
//! Volumes:
//!
//! - **INP** - Abaqus-style input decks holding tetrahedral tissue models
//!   with parts, element sets and node sets
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{load_mesh, save_stl};
//!
//! // Format detected from the extension
//! let deformed = load_mesh("output/Obj/14.0000_stent.obj").unwrap();
//! save_stl(&deformed, "deformed.stl", true).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod inp;
mod obj;
mod stl;

pub use error::{IoError, IoResult};
pub use inp::{InpModel, load_inp, parse_inp};
pub use obj::{load_obj, save_obj};
pub use stl::{WELD_TOLERANCE, load_stl, save_stl};

use std::path::Path;

use mesh_types::IndexedMesh;

/// Supported surface formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshFormat {
    /// STL, binary or ASCII.
    Stl,
    /// Wavefront OBJ.
    Obj,
}

impl MeshFormat {
    /// Detect the format from a file extension (case-insensitive).
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            _ => None,
        }
    }

    /// Canonical file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Obj => "obj",
        }
    }
}

fn detect(path: &Path) -> IoResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| IoError::UnknownFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a surface mesh, dispatching on the file extension.
///
/// # Errors
///
/// Returns an error if the extension is not recognized or the file cannot
/// be read or parsed.
pub fn load_mesh<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    match detect(path)? {
        MeshFormat::Stl => load_stl(path),
        MeshFormat::Obj => load_obj(path),
    }
}

/// Save a surface mesh, dispatching on the file extension.
///
/// STL output is binary.
///
/// # Errors
///
/// Returns an error if the extension is not recognized or the file cannot
/// be written.
pub fn save_mesh<P: AsRef<Path>>(mesh: &IndexedMesh, path: P) -> IoResult<()> {
    let path = path.as_ref();
    match detect(path)? {
        MeshFormat::Stl => save_stl(mesh, path, true),
        MeshFormat::Obj => save_obj(mesh, path),
    }
}
