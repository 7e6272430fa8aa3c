//! Planar cross-sections of triangle surfaces.
//!
//! Where only slice measurements of a vessel exist, a simulated surface is
//! compared at the same heights: cut it with a plane, chain the cut into
//! polylines, flatten them into the plane and fit an ellipse whose axes,
//! area and perimeter can be checked against the measured values.
//!
//! - [`cut_mesh`] - plane/triangle intersection and segment stitching
//! - [`PlaneFrame`] - rigid map from the cutting plane to 2D
//! - [`fit_ellipse`] - direct least-squares ellipse fit
//!
//! # Example
//!
//! ```
//! use mesh_slice::{Plane, cut_mesh, fit_ellipse};
//! use mesh_types::unit_cube;
//! use nalgebra::Vector3;
//!
//! let section = cut_mesh(&unit_cube(), &Plane::at_height(Vector3::y(), 0.5).unwrap()).unwrap();
//! let ellipse = fit_ellipse(&section.projected()).unwrap();
//!
//! // A square section fits a circle-like ellipse centered on the square.
//! assert!((ellipse.semi_major - ellipse.semi_minor).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod contour;
mod ellipse;
mod error;
mod plane;

pub use contour::{CrossSection, Polyline, STITCH_TOLERANCE, cut_mesh, stitch_segments};
pub use ellipse::{Ellipse, MIN_FIT_POINTS, fit_ellipse};
pub use error::{SliceError, SliceResult};
pub use plane::{Plane, PlaneFrame};
