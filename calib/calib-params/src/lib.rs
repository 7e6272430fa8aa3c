//! Calibration parameters.
//!
//! An optimizer searches the unit cube; the solver needs physical material
//! values. This crate declares the mapping between the two:
//!
//! - [`ParameterSpec`] - one bounded physical quantity tied to a region
//! - [`ParameterSpace`] - the ordered list defining the search dimension
//! - [`PropertyMap`] - `<region>_<kind>` values for one evaluation
//!
//! Denormalization always clamps, so optimizer overshoot never reaches the
//! solver as an out-of-range material.
//!
//! # Example
//!
//! ```
//! use calib_params::{ParameterSpace, ParameterSpec, PropertyKind};
//!
//! let space = ParameterSpace::new(vec![
//!     ParameterSpec::new("Aorta_E", "Aorta", PropertyKind::Modulus, 0.1e6, 10e6).unwrap(),
//!     ParameterSpec::new("Aorta_Nu", "Aorta", PropertyKind::PoissonRatio, 0.3, 0.49).unwrap(),
//! ])
//! .unwrap();
//!
//! let physical = space.denormalize_all(&[1.2, -0.5]).unwrap();
//! assert_eq!(physical, vec![10e6, 0.3]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod cost;
mod error;
mod property;
mod space;
mod spec;

pub use cost::{SENTINEL_COST, is_sentinel};
pub use error::{ParamError, ParamResult};
pub use property::{DEFAULT_POISSON_RATIO, DEFAULT_REGION, PropertyMap, VESSEL_REGION};
pub use space::{AlwaysAppliedRegion, ParameterSpace, clamp_unit};
pub use spec::{ParameterSpec, PropertyKind, denormalize, normalize, property_key};
