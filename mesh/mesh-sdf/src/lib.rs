//! Distance queries from points to triangle surfaces.
//!
//! Anatomical regions are described by reference surfaces; assigning a
//! material to a tetrahedron asks how far its centroid lies from each of
//! them. Scoring a simulation asks the same of every ground-truth vertex.
//! Both need thousands to millions of queries against one fixed surface, so
//! the surface is indexed once in a [`SignedDistanceField`]:
//!
//! - triangles are stored in a median-split bounding volume hierarchy
//! - the closest point is found with Ericson's Voronoi-region walk
//! - the sign comes from angle-weighted pseudonormals, which stays correct
//!   when the closest point sits on an edge or a corner
//!
//! # Example
//!
//! ```
//! use mesh_sdf::SignedDistanceField;
//! use mesh_types::unit_cube;
//! use nalgebra::Point3;
//!
//! let sdf = SignedDistanceField::new(unit_cube()).unwrap();
//! let inside = sdf.distance(Point3::new(0.5, 0.5, 0.25));
//! let outside = sdf.unsigned_distance(Point3::new(-1.0, 0.5, 0.5));
//!
//! assert!((inside + 0.25).abs() < 1e-12);
//! assert!((outside - 1.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bvh;
mod error;
mod query;
mod sdf;

pub use bvh::{Bvh, NearestHit};
pub use error::{SdfError, SdfResult};
pub use query::{TriangleFeature, closest_feature_on_triangle, closest_point_on_triangle};
pub use sdf::{SignedDistanceField, signed_distance, unsigned_distance};
