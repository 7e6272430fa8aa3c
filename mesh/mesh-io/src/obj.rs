//! Wavefront OBJ support.
//!
//! The structural solver exports deformed device and vessel surfaces as OBJ
//! frames (`<output_root>/output/Obj/<time>_<part>.obj`). Only positions and
//! face connectivity are read; texture and normal indices are ignored.
//! Polygons are fan-triangulated.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Vertex};

use crate::error::{IoError, IoResult};

/// Load a mesh from an OBJ file.
///
/// Negative (relative) indices are resolved against the vertices read so
/// far.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a coordinate does not
/// parse, or a face references a vertex that does not exist.
pub fn load_obj<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::from_open(e, path))?;
    parse_obj(BufReader::new(file))
}

fn parse_obj<R: BufRead>(reader: R) -> IoResult<IndexedMesh> {
    let mut mesh = IndexedMesh::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .map_err(|_| bad_line(line_no, "vertex coordinate"))?;
                let [x, y, z] = coords[..] else {
                    return Err(bad_line(line_no, "vertex needs 3 coordinates"));
                };
                mesh.vertices.push(Vertex::from_coords(x, y, z));
            }
            Some("f") => {
                let corners = tokens
                    .map(|t| resolve_index(t, mesh.vertices.len(), line_no))
                    .collect::<IoResult<Vec<u32>>>()?;
                if corners.len() < 3 {
                    return Err(bad_line(line_no, "face needs at least 3 corners"));
                }
                for i in 1..corners.len() - 1 {
                    mesh.faces.push([corners[0], corners[i], corners[i + 1]]);
                }
            }
            _ => {}
        }
    }

    Ok(mesh)
}

/// Resolve `7`, `7/1`, `7//3` or `-1` style references to a 0-based index.
fn resolve_index(token: &str, vertex_count: usize, line_no: usize) -> IoResult<u32> {
    let head = token.split('/').next().unwrap_or(token);
    let raw: i64 = head
        .parse()
        .map_err(|_| bad_line(line_no, "face index"))?;
    let count = i64::try_from(vertex_count).map_err(|_| bad_line(line_no, "vertex count"))?;
    let zero_based = if raw > 0 { raw - 1 } else { count + raw };
    if raw == 0 || zero_based < 0 || zero_based >= count {
        return Err(bad_line(line_no, "face index out of range"));
    }
    u32::try_from(zero_based).map_err(|_| bad_line(line_no, "face index"))
}

fn bad_line(line_no: usize, what: &str) -> IoError {
    IoError::invalid_content(format!("OBJ line {}: {what}", line_no + 1))
}

/// Save a mesh as OBJ.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_obj<P: AsRef<Path>>(mesh: &IndexedMesh, path: P) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for p in mesh.positions() {
        writeln!(writer, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for [a, b, c] in &mesh.faces {
        writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quad_is_fan_triangulated() {
        let text = "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1 4//1\n";
        let mesh = parse_obj(text.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_relative_eq!(mesh.surface_area(), 1.0);
    }

    #[test]
    fn relative_indices_resolve_backwards() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse_obj(text.as_bytes()).unwrap();
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let text = "v 0 0 0\nv 1 0 0\nf 1 2 3\n";
        assert!(matches!(
            parse_obj(text.as_bytes()),
            Err(IoError::InvalidContent { .. })
        ));
    }

    #[test]
    fn save_then_load_preserves_cube() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.obj");
        save_obj(&mesh_types::unit_cube(), &path).unwrap();
        let loaded = load_obj(&path).unwrap();
        assert_eq!(loaded.vertex_count(), 8);
        assert_eq!(loaded.face_count(), 12);
        assert_relative_eq!(loaded.surface_area(), 6.0, epsilon = 1e-12);
    }
}
