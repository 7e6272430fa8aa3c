//! Priority and determinism of region-based assignment on a tetrahedral grid.

#![allow(clippy::unwrap_used)]

use calib_material::{
    DEFAULT_SEARCH_RADIUS, LameParameters, MaterialError, MaterialMapper, TissueModel,
    lame_from_elastic,
};
use calib_params::PropertyMap;
use mesh_types::{IndexedMesh, Point3, TetMesh, Vector3, unit_cube};

/// One small tetrahedron per grid cell of a `n³` lattice with spacing 1,
/// all in part `PART-AORTA`.
fn lattice(n: u32) -> TetMesh {
    let mut mesh = TetMesh::new();
    let mut all = Vec::new();
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let p = Point3::new(f64::from(i), f64::from(j), f64::from(k));
                let base = u32::try_from(mesh.nodes.len()).unwrap();
                mesh.nodes.push(p);
                mesh.nodes.push(p + Vector3::new(0.2, 0.0, 0.0));
                mesh.nodes.push(p + Vector3::new(0.0, 0.2, 0.0));
                mesh.nodes.push(p + Vector3::new(0.0, 0.0, 0.2));
                all.push(mesh.elements.len());
                mesh.elements.push([base, base + 1, base + 2, base + 3]);
            }
        }
    }
    mesh.element_sets.insert("PART-AORTA".into(), all);
    mesh
}

/// Axis-aligned box surface from `min` with edge `size`.
fn cube(min: f64, size: f64) -> IndexedMesh {
    let mut mesh = unit_cube();
    for v in &mut mesh.vertices {
        v.position = Point3::from(v.position.coords * size + Vector3::repeat(min));
    }
    mesh
}

fn base() -> LameParameters {
    LameParameters::new(0.0, 0.0)
}

fn mapper() -> MaterialMapper {
    let mut mapper = MaterialMapper::new();
    mapper.add_region("Low", cube(-0.5, 10.0), 1).unwrap();
    mapper.add_region("High", cube(-0.5, 3.0), 10).unwrap();
    mapper.initialize().unwrap();
    mapper
}

#[test]
fn higher_priority_wins_overlaps() {
    let mut model = TissueModel::new(lattice(6), base());
    let map: PropertyMap = [("Low_E", 1.0e6), ("High_E", 9.0e6)].into_iter().collect();
    let report = mapper().apply_materials(&mut model, &map, 0.0).unwrap();

    assert_eq!(report.eligible_elements, 216);
    assert_eq!(report.assigned_elements, 216);
    for (i, m) in model.materials().iter().enumerate() {
        let c = model.mesh().element_centroid(i).unwrap();
        let inside_high = c.x < 2.5 && c.y < 2.5 && c.z < 2.5;
        let expected = if inside_high { 9.0e6 } else { 1.0e6 };
        assert!((m.youngs_modulus() - expected).abs() < 1e-3, "element {i}");
    }
}

#[test]
fn missing_key_falls_through_to_next_region() {
    let mut model = TissueModel::new(lattice(3), base());
    let map: PropertyMap = [("Low_E", 1.0e6)].into_iter().collect();
    mapper().apply_materials(&mut model, &map, 0.0).unwrap();
    let expected = lame_from_elastic(1.0e6, 0.4);
    assert!(model.materials().iter().all(|m| *m == expected));
}

#[test]
fn search_radius_extends_region_outward() {
    let mut mapper = MaterialMapper::new();
    // Surface ends at x = 1.5; lattice cells at x = 2 and 3 lie outside.
    mapper.add_region("Near", cube(-0.5, 2.0), 1).unwrap();
    mapper.initialize().unwrap();
    let map: PropertyMap = [("Near_E", 5.0e5)].into_iter().collect();

    let mut tight = TissueModel::new(lattice(4), base());
    let tight_report = mapper.apply_materials(&mut tight, &map, 0.0).unwrap();
    let mut wide = TissueModel::new(lattice(4), base());
    let wide_report = mapper
        .apply_materials(&mut wide, &map, DEFAULT_SEARCH_RADIUS)
        .unwrap();

    assert_eq!(tight_report.assigned_elements, 8);
    assert!(wide_report.assigned_elements > tight_report.assigned_elements);
}

#[test]
fn repeated_runs_are_identical() {
    let mapper = mapper();
    let map: PropertyMap = [("Low_E", 2.0e6), ("High_E", 4.0e6), ("High_Nu", 0.45)]
        .into_iter()
        .collect();
    let mut first = TissueModel::new(lattice(5), base());
    let mut second = TissueModel::new(lattice(5), base());
    mapper.apply_materials(&mut first, &map, 1.0).unwrap();
    mapper.apply_materials(&mut second, &map, 1.0).unwrap();
    assert_eq!(first.materials(), second.materials());
}

#[test]
fn single_region_covering_mesh_assigns_every_eligible_element() {
    let mut mapper = MaterialMapper::new();
    mapper.add_region("RegionA", cube(-0.5, 4.0), 1).unwrap();
    mapper.initialize().unwrap();

    let mut mesh = lattice(3);
    // An element outside the allow-listed parts stays untouched.
    mesh.nodes.extend([Point3::new(1.0, 1.0, 1.0); 4]);
    mesh.elements.push([27 * 4, 27 * 4 + 1, 27 * 4 + 2, 27 * 4 + 3]);
    let mut model = TissueModel::new(mesh, base());

    let map: PropertyMap = [("RegionA_Modulus", 5.05e6)].into_iter().collect();
    let report = mapper
        .apply_materials(&mut model, &map, DEFAULT_SEARCH_RADIUS)
        .unwrap();

    assert_eq!(report.assigned_elements, 27);
    let expected = lame_from_elastic(5.05e6, 0.4);
    assert!(model.materials()[..27].iter().all(|m| *m == expected));
    assert_eq!(model.material(27), Some(base()));
}

#[test]
fn surfaces_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annulus.stl");
    mesh_io::save_mesh(&cube(-0.5, 2.0), &path).unwrap();

    let mut mapper = MaterialMapper::new();
    mapper.add_region("AorticAnnulus", path.as_path(), 10).unwrap();
    mapper.initialize().unwrap();
    assert!(mapper.regions()[0].distance(Point3::new(0.5, 0.5, 0.5)) < 0.0);

    let mut broken = MaterialMapper::new();
    broken
        .add_region("Missing", dir.path().join("nope.stl").as_path(), 1)
        .unwrap();
    assert!(matches!(broken.initialize(), Err(MaterialError::Load { .. })));
}
