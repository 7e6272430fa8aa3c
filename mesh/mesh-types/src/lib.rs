//! Core geometry types for the calibration workspace.
//!
//! This crate provides the mesh representations shared by every other crate:
//!
//! - [`Vertex`] - A point in 3D space
//! - [`IndexedMesh`] - A triangle surface mesh with indexed vertices
//! - [`Triangle`] - A concrete triangle with resolved vertex positions
//! - [`Aabb`] - Axis-aligned bounding box
//! - [`TetMesh`] - A tetrahedral volume mesh with named element and node sets
//!
//! # Units
//!
//! All coordinates are `f64` and unit-agnostic. Patient datasets are
//! expressed in millimeters.
//!
//! # Example
//!
//! ```
//! use mesh_types::{IndexedMesh, Vertex};
//!
//! let mut mesh = IndexedMesh::new();
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
//! mesh.faces.push([0, 1, 2]);
//!
//! assert_eq!(mesh.face_count(), 1);
//! assert!(!mesh.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
mod tet;
mod triangle;
mod vertex;

pub use bounds::Aabb;
pub use mesh::{IndexedMesh, unit_cube};
pub use tet::TetMesh;
pub use triangle::Triangle;
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
