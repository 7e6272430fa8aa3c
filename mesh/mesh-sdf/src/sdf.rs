//! Signed distance queries against a triangle surface.

use hashbrown::HashMap;
use mesh_types::{IndexedMesh, Triangle};
use nalgebra::{Point3, Vector3};

use crate::bvh::{Bvh, NearestHit};
use crate::error::{SdfError, SdfResult};
use crate::query::TriangleFeature;

/// Distance query structure for one reference surface.
///
/// The sign follows the angle-weighted pseudonormal of the closest feature
/// (Bærentzen and Aanæs 2005): negative inside a closed, outward-wound
/// surface, positive outside. For open surfaces the sign reports which side
/// of the nearest patch the query lies on.
///
/// The structure is immutable after construction and safe to share across
/// threads.
#[derive(Debug, Clone)]
pub struct SignedDistanceField {
    mesh: IndexedMesh,
    triangles: Vec<Triangle>,
    bvh: Bvh,
    face_normals: Vec<Vector3<f64>>,
    vertex_normals: Vec<Vector3<f64>>,
    edge_normals: HashMap<(u32, u32), Vector3<f64>>,
}

impl SignedDistanceField {
    /// Build the query structure.
    ///
    /// # Errors
    ///
    /// Returns [`SdfError::EmptyMesh`] if the mesh has no faces and
    /// [`SdfError::InvalidFace`] if a face references a missing vertex.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_sdf::SignedDistanceField;
    /// use mesh_types::unit_cube;
    /// use nalgebra::Point3;
    ///
    /// let sdf = SignedDistanceField::new(unit_cube()).unwrap();
    /// assert!(sdf.distance(Point3::new(0.5, 0.5, 0.5)) < 0.0);
    /// assert!((sdf.distance(Point3::new(0.5, 0.5, 3.0)) - 2.0).abs() < 1e-12);
    /// ```
    pub fn new(mesh: IndexedMesh) -> SdfResult<Self> {
        if mesh.faces.is_empty() {
            return Err(SdfError::EmptyMesh);
        }
        let triangles = (0..mesh.face_count())
            .map(|face| mesh.triangle(face).ok_or(SdfError::InvalidFace { face }))
            .collect::<SdfResult<Vec<_>>>()?;
        let bvh = Bvh::build(&triangles).ok_or(SdfError::EmptyMesh)?;

        let face_normals: Vec<Vector3<f64>> = triangles
            .iter()
            .map(|t| t.normal().unwrap_or_else(Vector3::zeros))
            .collect();

        let mut vertex_normals = vec![Vector3::zeros(); mesh.vertex_count()];
        let mut edge_normals: HashMap<(u32, u32), Vector3<f64>> =
            HashMap::with_capacity(mesh.face_count() * 3 / 2);

        for ((face, tri), n) in mesh.faces.iter().zip(&triangles).zip(&face_normals) {
            let corners = tri.vertices();
            for i in 0..3 {
                let prev = corners[(i + 2) % 3] - corners[i];
                let next = corners[(i + 1) % 3] - corners[i];
                let angle = prev.angle(&next);
                vertex_normals[face[i] as usize] += n * angle;

                *edge_normals
                    .entry(edge_key(face[i], face[(i + 1) % 3]))
                    .or_insert_with(Vector3::zeros) += n;
            }
        }

        Ok(Self {
            mesh,
            triangles,
            bvh,
            face_normals,
            vertex_normals,
            edge_normals,
        })
    }

    /// Signed distance from `point` to the surface.
    #[must_use]
    pub fn distance(&self, point: Point3<f64>) -> f64 {
        let hit = self.nearest(&point);
        let d = hit.distance_squared.sqrt();
        if (point - hit.point).dot(&self.pseudonormal(&hit)) < 0.0 {
            -d
        } else {
            d
        }
    }

    /// Unsigned distance from `point` to the surface.
    #[must_use]
    pub fn unsigned_distance(&self, point: Point3<f64>) -> f64 {
        self.nearest(&point).distance_squared.sqrt()
    }

    /// Closest point on the surface.
    #[must_use]
    pub fn closest_point(&self, point: Point3<f64>) -> Point3<f64> {
        self.nearest(&point).point
    }

    /// True if the signed distance is negative.
    #[must_use]
    pub fn is_inside(&self, point: Point3<f64>) -> bool {
        self.distance(point) < 0.0
    }

    /// The surface this field was built from.
    #[must_use]
    pub fn mesh(&self) -> &IndexedMesh {
        &self.mesh
    }

    fn nearest(&self, point: &Point3<f64>) -> NearestHit {
        // A non-empty tree always yields a hit; the fallback keeps the
        // signature total.
        self.bvh
            .nearest(&self.triangles, point)
            .unwrap_or(NearestHit {
                face: 0,
                point: *point,
                feature: TriangleFeature::Face,
                distance_squared: f64::INFINITY,
            })
    }

    fn pseudonormal(&self, hit: &NearestHit) -> Vector3<f64> {
        let face = self.mesh.faces[hit.face];
        match hit.feature {
            TriangleFeature::Face => self.face_normals[hit.face],
            TriangleFeature::Vertex(i) => self.vertex_normals[face[i] as usize],
            TriangleFeature::Edge(i) => self
                .edge_normals
                .get(&edge_key(face[i], face[(i + 1) % 3]))
                .copied()
                .unwrap_or(self.face_normals[hit.face]),
        }
    }
}

const fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

/// One-off signed distance. Builds a [`SignedDistanceField`] internally.
///
/// # Errors
///
/// See [`SignedDistanceField::new`].
pub fn signed_distance(point: Point3<f64>, mesh: &IndexedMesh) -> SdfResult<f64> {
    Ok(SignedDistanceField::new(mesh.clone())?.distance(point))
}

/// One-off unsigned distance. Builds a [`SignedDistanceField`] internally.
///
/// # Errors
///
/// See [`SignedDistanceField::new`].
pub fn unsigned_distance(point: Point3<f64>, mesh: &IndexedMesh) -> SdfResult<f64> {
    Ok(SignedDistanceField::new(mesh.clone())?.unsigned_distance(point))
}
