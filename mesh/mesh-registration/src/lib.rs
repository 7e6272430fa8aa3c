//! Rigid registration of surfaces.
//!
//! Comparing a simulated vessel against a post-procedure scan only makes
//! sense once both sit in the same frame. This crate provides:
//!
//! - [`centroid_align`] - coarse translation matching vertex centroids
//! - [`icp_align`] - rigid iterative closest point with a fixed iteration cap
//! - [`kabsch`] - least-squares rigid fit for paired points
//! - [`RigidTransform`] - rotation plus translation
//!
//! # Example
//!
//! ```
//! use mesh_registration::{IcpParams, centroid_align, icp_align};
//! use mesh_types::{Vector3, unit_cube};
//!
//! let simulated = unit_cube();
//! let mut truth = unit_cube();
//! truth.translate(Vector3::new(12.0, -3.0, 0.5));
//!
//! let coarse = centroid_align(&truth, &simulated).unwrap();
//! let fine = icp_align(&coarse, &simulated, &IcpParams::default()).unwrap();
//! let aligned = fine.transform.transform_mesh(&coarse);
//!
//! assert!(fine.rms_error < 1e-9);
//! assert_eq!(aligned.vertex_count(), truth.vertex_count());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod align;
mod error;
mod icp;
mod kabsch;
mod transform;

pub use align::{centroid_align, centroid_alignment};
pub use error::{RegistrationError, RegistrationResult};
pub use icp::{CorrespondenceMode, IcpParams, IcpResult, icp_align, icp_align_points};
pub use kabsch::{centroid, kabsch};
pub use transform::RigidTransform;
