//! Nodal stiffness export in the ASCII finite-element zone format.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::model::TissueModel;
use crate::{MaterialError, MaterialResult};

/// Zone title used by the default export.
pub const MODULUS_ZONE: &str = "Vessel_ElasticModulus";

/// Write nodal-averaged Young's modulus as a point-packed tetrahedral zone.
///
/// Node lines carry `X Y Z E` with six decimals; connectivity is 1-based.
///
/// # Errors
///
/// Propagates writer errors.
///
/// # Example
///
/// ```
/// use calib_material::{LameParameters, TissueModel, write_modulus_zone};
/// use mesh_types::{Point3, TetMesh};
///
/// let mut mesh = TetMesh::new();
/// mesh.nodes = vec![Point3::origin(); 4];
/// mesh.elements.push([0, 1, 2, 3]);
/// let model = TissueModel::new(mesh, LameParameters::from_elastic(1.0e6, 0.4));
///
/// let mut out = Vec::new();
/// write_modulus_zone(&model, "Z", &mut out).unwrap();
/// let text = String::from_utf8(out).unwrap();
/// assert!(text.contains("ZONETYPE=FETetrahedron"));
/// assert!(text.ends_with("1\t2\t3\t4\n"));
/// ```
pub fn write_modulus_zone<W: Write>(
    model: &TissueModel,
    zone: &str,
    writer: &mut W,
) -> std::io::Result<()> {
    let mesh = model.mesh();
    let nodal = model.nodal_modulus();

    writeln!(writer, "TITLE=\"Finite Element - Elastic Modulus\"")?;
    writeln!(writer, "VARIABLES=\"X\",\"Y\",\"Z\",\"ElasticModulus\"")?;
    writeln!(writer, "ZONE T=\"{zone}\"")?;
    writeln!(
        writer,
        "Nodes={}, Elements={}, ZONETYPE=FETetrahedron",
        mesh.node_count(),
        mesh.element_count()
    )?;
    writeln!(writer, "DATAPACKING=POINT")?;

    for (p, e) in mesh.nodes.iter().zip(&nodal) {
        writeln!(writer, "{:.6}\t{:.6}\t{:.6}\t{e:.6}", p.x, p.y, p.z)?;
    }
    for [a, b, c, d] in &mesh.elements {
        writeln!(writer, "{}\t{}\t{}\t{}", a + 1, b + 1, c + 1, d + 1)?;
    }
    Ok(())
}

/// Write [`write_modulus_zone`] output to a file.
///
/// # Errors
///
/// Returns [`MaterialError::Export`] if the file cannot be written.
pub fn export_modulus<P: AsRef<Path>>(model: &TissueModel, path: P, zone: &str) -> MaterialResult<()> {
    let path = path.as_ref();
    let wrap = |source| MaterialError::Export {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(wrap)?);
    write_modulus_zone(model, zone, &mut writer).map_err(wrap)?;
    writer.flush().map_err(wrap)?;
    info!(path = %path.display(), "Exported nodal modulus");
    Ok(())
}
