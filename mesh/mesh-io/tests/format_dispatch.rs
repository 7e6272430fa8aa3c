//! Cross-format checks through the extension-dispatching entry points.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use approx::assert_relative_eq;
use mesh_io::{load_inp, load_mesh, save_mesh};
use mesh_types::{Vector3, unit_cube};
use tempfile::tempdir;

#[test]
fn stl_and_obj_describe_the_same_surface() {
    let dir = tempdir().expect("temp dir");
    let mut cube = unit_cube();
    cube.translate(Vector3::new(-0.5, 2.0, 0.0));

    let stl = dir.path().join("cube.stl");
    let obj = dir.path().join("cube.obj");
    save_mesh(&cube, &stl).unwrap();
    save_mesh(&cube, &obj).unwrap();

    let a = load_mesh(&stl).unwrap();
    let b = load_mesh(&obj).unwrap();
    assert_eq!(a.face_count(), b.face_count());
    assert_eq!(a.vertex_count(), b.vertex_count());
    assert_relative_eq!(a.surface_area(), b.surface_area(), epsilon = 1e-6);

    let (ca, cb) = (a.centroid().unwrap(), b.centroid().unwrap());
    assert_relative_eq!((ca - cb).norm(), 0.0, epsilon = 1e-6);
}

#[test]
fn inp_file_on_disk_loads() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("tissue.inp");
    std::fs::write(
        &path,
        "*NODE\n1,0,0,0\n2,2,0,0\n3,0,2,0\n4,0,0,2\n*ELEMENT, TYPE=C3D4, ELSET=ES_AORTA\n7,1,2,3,4\n",
    )
    .unwrap();

    let model = load_inp(&path).unwrap();
    assert_eq!(model.mesh.element_count(), 1);
    let c = model.mesh.element_centroid(0).unwrap();
    assert_relative_eq!(c.x, 0.5);
    assert_relative_eq!(c.y, 0.5);
    assert_relative_eq!(c.z, 0.5);
}
