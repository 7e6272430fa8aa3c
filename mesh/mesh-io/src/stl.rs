//! STL surface support (ASCII and binary).
//!
//! The solver writes deformed surfaces and the ground-truth scans arrive as
//! STL, so this is the primary surface format. STL is a triangle soup; the
//! loader welds coincident corners so downstream distance queries see a
//! connected surface.
//!
//! # Binary layout
//!
//! ```text
//! UINT8[80]    header
//! UINT32       triangle count
//! per triangle
//!     REAL32[3] normal (ignored on load, recomputed on save)
//!     REAL32[3] vertex 1..3
//!     UINT16    attribute byte count
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use mesh_types::{IndexedMesh, Point3, Triangle, Vector3, Vertex};

use crate::error::{IoError, IoResult};

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

/// Coordinates closer than this are treated as one vertex when welding.
pub const WELD_TOLERANCE: f64 = 1e-9;

/// Load an STL file, detecting ASCII or binary encoding.
///
/// A file is binary when its length matches the triangle count in its
/// header exactly; otherwise a leading `solid` keyword selects ASCII.
/// Coincident vertices are welded.
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] for a missing file and
/// [`IoError::InvalidContent`] when the bytes are neither valid encoding.
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_stl;
///
/// let mesh = load_stl("14.0000_stent.stl").unwrap();
/// println!("{} triangles", mesh.face_count());
/// ```
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<IndexedMesh> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| IoError::from_open(e, path))?;
    let mut mesh = parse_stl(&bytes)?;
    mesh.merge_duplicate_vertices(WELD_TOLERANCE);
    Ok(mesh)
}

/// Decode STL bytes into an unwelded triangle soup.
fn parse_stl(bytes: &[u8]) -> IoResult<IndexedMesh> {
    if looks_binary(bytes) {
        return parse_binary(bytes);
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_SIZE)]);
    if head.trim_start().starts_with("solid") {
        parse_ascii(BufReader::new(bytes))
    } else {
        parse_binary(bytes)
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    triangle_count(bytes).is_some_and(|n| bytes.len() == HEADER_SIZE + 4 + n * TRIANGLE_SIZE)
}

fn triangle_count(bytes: &[u8]) -> Option<usize> {
    let raw: [u8; 4] = bytes.get(HEADER_SIZE..HEADER_SIZE + 4)?.try_into().ok()?;
    usize::try_from(u32::from_le_bytes(raw)).ok()
}

fn parse_binary(bytes: &[u8]) -> IoResult<IndexedMesh> {
    let count = triangle_count(bytes).ok_or(IoError::InvalidHeader {
        expected: HEADER_SIZE + 4,
        got: bytes.len(),
    })?;

    let body = &bytes[HEADER_SIZE + 4..];
    let available = body.len() / TRIANGLE_SIZE;
    if available < count {
        return Err(IoError::invalid_content(format!(
            "binary STL declares {count} triangles but holds {available}"
        )));
    }

    let mut mesh = IndexedMesh::with_capacity(count * 3, count);
    for record in body.chunks_exact(TRIANGLE_SIZE).take(count) {
        // Bytes 0..12 hold the stored normal.
        let corners = [
            read_point(&record[12..24]),
            read_point(&record[24..36]),
            read_point(&record[36..48]),
        ];
        push_facet(&mut mesh, corners);
    }
    Ok(mesh)
}

fn read_point(buf: &[u8]) -> Point3<f64> {
    let component = |i: usize| {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&buf[i * 4..i * 4 + 4]);
        f64::from(f32::from_le_bytes(raw))
    };
    Point3::new(component(0), component(1), component(2))
}

#[allow(clippy::cast_possible_truncation)] // meshes stay below u32::MAX vertices
fn push_facet(mesh: &mut IndexedMesh, corners: [Point3<f64>; 3]) {
    let base = mesh.vertices.len() as u32;
    mesh.vertices.extend(corners.into_iter().map(Vertex::new));
    mesh.faces.push([base, base + 1, base + 2]);
}

fn parse_ascii<R: BufRead>(reader: R) -> IoResult<IndexedMesh> {
    let mut mesh = IndexedMesh::new();
    let mut corners: Vec<Point3<f64>> = Vec::with_capacity(3);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "outer" => corners.clear(),
            "vertex" => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .map_err(|_| {
                        IoError::invalid_content(format!("bad vertex on line {}", line_no + 1))
                    })?;
                if coords.len() != 3 {
                    return Err(IoError::invalid_content(format!(
                        "vertex on line {} needs 3 coordinates",
                        line_no + 1
                    )));
                }
                corners.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            "endfacet" => {
                if let [a, b, c] = corners[..] {
                    push_facet(&mut mesh, [a, b, c]);
                }
                corners.clear();
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(mesh)
}

/// Save a mesh as STL.
///
/// Facet normals are recomputed from the winding. Binary output stores
/// coordinates as `f32`.
///
/// # Errors
///
/// Returns an error if the file cannot be written or a face references a
/// missing vertex.
pub fn save_stl<P: AsRef<Path>>(mesh: &IndexedMesh, path: P, binary: bool) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    if binary {
        write_binary(mesh, &mut writer)?;
    } else {
        write_ascii(mesh, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn facets(mesh: &IndexedMesh) -> IoResult<Vec<Triangle>> {
    (0..mesh.face_count())
        .map(|i| {
            mesh.triangle(i).ok_or_else(|| {
                IoError::invalid_content(format!("face {i} references a missing vertex"))
            })
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation)] // STL stores f32 coordinates and a u32 count
fn write_binary<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    let triangles = facets(mesh)?;

    let mut header = [b' '; HEADER_SIZE];
    let label = b"binary STL written by mesh-io";
    header[..label.len()].copy_from_slice(label);
    writer.write_all(&header)?;
    writer.write_all(&(triangles.len() as u32).to_le_bytes())?;

    for tri in &triangles {
        let normal = tri.normal().unwrap_or_else(Vector3::zeros);
        let mut record = Vec::with_capacity(12);
        record.extend(normal.iter().copied());
        for p in tri.vertices() {
            record.extend(p.coords.iter().copied());
        }
        for value in record {
            writer.write_all(&(value as f32).to_le_bytes())?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

fn write_ascii<W: Write>(mesh: &IndexedMesh, writer: &mut W) -> IoResult<()> {
    writeln!(writer, "solid mesh")?;
    for tri in facets(mesh)? {
        let n = tri.normal().unwrap_or_else(Vector3::zeros);
        writeln!(writer, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for p in tri.vertices() {
            writeln!(writer, "      vertex {:e} {:e} {:e}", p.x, p.y, p.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid mesh")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::unit_cube;

    #[test]
    fn binary_save_load_welds_cube() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        save_stl(&unit_cube(), &path, true).unwrap();

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.vertex_count(), 8);
        assert_relative_eq!(loaded.surface_area(), 6.0, epsilon = 1e-6);
    }

    #[test]
    fn ascii_save_load_keeps_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube_ascii.stl");
        let mut cube = unit_cube();
        cube.translate(Vector3::new(0.125, -3.5, 10.0));
        save_stl(&cube, &path, false).unwrap();

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.vertex_count(), 8);
        let c = loaded.centroid().unwrap();
        assert_relative_eq!(c.x, 0.625, epsilon = 1e-12);
        assert_relative_eq!(c.y, -3.0, epsilon = 1e-12);
        assert_relative_eq!(c.z, 10.5, epsilon = 1e-12);
    }

    #[test]
    fn binary_with_solid_prefix_is_detected_by_size() {
        let mut bytes = Vec::new();
        let mut header = [0u8; HEADER_SIZE];
        header[..5].copy_from_slice(b"solid");
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        for v in [0.0f32, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());

        let mesh = parse_stl(&bytes).unwrap();
        assert_eq!(mesh.face_count(), 1);
        assert_relative_eq!(mesh.vertices[1].position.x, 1.0);
    }

    #[test]
    fn truncated_binary_is_rejected() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; TRIANGLE_SIZE]);
        assert!(matches!(
            parse_stl(&bytes),
            Err(IoError::InvalidContent { .. })
        ));
    }

    #[test]
    fn ascii_bad_vertex_is_rejected() {
        let text = b"solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 zero 0\n";
        assert!(parse_stl(text).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        match load_stl("does_not_exist_8841.stl") {
            Err(IoError::FileNotFound { path }) => {
                assert!(path.to_string_lossy().contains("does_not_exist"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
