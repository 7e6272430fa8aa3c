//! Cross-sections of synthetic tubes.

#![allow(clippy::unwrap_used)]

use std::f64::consts::{PI, TAU};

use approx::assert_relative_eq;
use mesh_slice::{MIN_FIT_POINTS, Plane, SliceError, cut_mesh, fit_ellipse};
use mesh_types::{IndexedMesh, Point3, Vector3};

/// Open elliptic tube along +Y with `segments` sides.
fn tube(a: f64, b: f64, height: f64, segments: u32) -> IndexedMesh {
    let mut points = Vec::new();
    for y in [0.0, height] {
        for i in 0..segments {
            let t = f64::from(i) * TAU / f64::from(segments);
            points.push(Point3::new(a * t.cos(), y, b * t.sin()));
        }
    }
    let mut faces = Vec::new();
    for i in 0..segments {
        let j = (i + 1) % segments;
        faces.push([i, segments + i, j]);
        faces.push([j, segments + i, segments + j]);
    }
    IndexedMesh::from_parts(points, faces)
}

#[test]
fn circular_tube_fits_its_radius() {
    let r = 12.0;
    let mesh = tube(r, r, 40.0, 128);
    let section = cut_mesh(&mesh, &Plane::at_height(Vector3::y(), 20.5).unwrap()).unwrap();

    assert_eq!(section.polylines.len(), 1);
    assert!(section.polylines[0].closed);

    let fit = fit_ellipse(&section.projected()).unwrap();
    // Chord midpoints sit slightly inside the circle.
    assert_relative_eq!(fit.semi_major, r, max_relative = 1e-3);
    assert_relative_eq!(fit.semi_minor, r, max_relative = 1e-3);
    assert_relative_eq!(fit.area(), PI * r * r, max_relative = 2e-3);
}

#[test]
fn elliptic_tube_reports_long_and_short_axes() {
    let mesh = tube(17.0, 14.5, 30.0, 256);
    let section = cut_mesh(&mesh, &Plane::at_height(Vector3::y(), 10.0).unwrap()).unwrap();
    let fit = fit_ellipse(&section.projected()).unwrap();

    assert_relative_eq!(fit.semi_major, 17.0, max_relative = 1e-3);
    assert_relative_eq!(fit.semi_minor, 14.5, max_relative = 1e-3);
    assert!(fit.circumference() > 2.0 * PI * 14.5);
    assert!(fit.circumference() < 2.0 * PI * 17.0);
}

#[test]
fn plane_outside_tube_has_too_few_points() {
    let mesh = tube(5.0, 5.0, 10.0, 32);
    let section = cut_mesh(&mesh, &Plane::at_height(Vector3::y(), 50.0).unwrap()).unwrap();
    assert!(section.point_count() < MIN_FIT_POINTS);
    assert!(matches!(
        fit_ellipse(&section.projected()),
        Err(SliceError::TooFewPoints { found: 0, .. })
    ));
}
