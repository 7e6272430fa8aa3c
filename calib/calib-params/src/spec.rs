//! Single-parameter declarations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ParamError, ParamResult};

/// Material property a parameter controls.
///
/// Property-map keys use the short suffixes `E` and `Nu`, e.g. `Aorta_E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Young's modulus, in pascals.
    #[serde(rename = "E", alias = "Modulus")]
    Modulus,
    /// Poisson's ratio, dimensionless.
    #[serde(rename = "Nu", alias = "PoissonRatio")]
    PoissonRatio,
}

impl PropertyKind {
    /// Key suffix used in property maps.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Modulus => "E",
            Self::PoissonRatio => "Nu",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for PropertyKind {
    type Err = ParamError;

    fn from_str(s: &str) -> ParamResult<Self> {
        match s {
            "E" | "Modulus" => Ok(Self::Modulus),
            "Nu" | "PoissonRatio" => Ok(Self::PoissonRatio),
            other => Err(ParamError::UnknownKind(other.to_string())),
        }
    }
}

/// Property-map key for a region and property kind.
///
/// # Example
///
/// ```
/// use calib_params::{PropertyKind, property_key};
///
/// assert_eq!(property_key("Aorta", PropertyKind::Modulus), "Aorta_E");
/// ```
#[must_use]
pub fn property_key(region: &str, kind: PropertyKind) -> String {
    format!("{region}_{}", kind.suffix())
}

/// One optimized physical quantity.
///
/// Immutable once built; bounds are checked at construction and on
/// deserialization.
///
/// # Example
///
/// ```
/// use calib_params::{ParameterSpec, PropertyKind};
///
/// let spec = ParameterSpec::new("Aorta_E", "Aorta", PropertyKind::Modulus, 0.1e6, 10e6).unwrap();
/// assert_eq!(spec.key(), "Aorta_E");
/// assert!((spec.denormalize(1.3) - 10e6).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpec")]
pub struct ParameterSpec {
    name: String,
    target_region: String,
    kind: PropertyKind,
    min: f64,
    max: f64,
}

#[derive(Deserialize)]
struct RawSpec {
    name: String,
    target_region: String,
    kind: PropertyKind,
    min: f64,
    max: f64,
}

impl TryFrom<RawSpec> for ParameterSpec {
    type Error = ParamError;

    fn try_from(raw: RawSpec) -> ParamResult<Self> {
        Self::new(raw.name, raw.target_region, raw.kind, raw.min, raw.max)
    }
}

impl ParameterSpec {
    /// Declare a parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvalidBounds`] unless `min < max` and both are
    /// finite.
    pub fn new(
        name: impl Into<String>,
        target_region: impl Into<String>,
        kind: PropertyKind,
        min: f64,
        max: f64,
    ) -> ParamResult<Self> {
        let name = name.into();
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(ParamError::InvalidBounds { name, min, max });
        }
        Ok(Self {
            name,
            target_region: target_region.into(),
            kind,
            min,
            max,
        })
    }

    /// Display name, used as the log column header.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region whose material this parameter sets.
    #[must_use]
    pub fn target_region(&self) -> &str {
        &self.target_region
    }

    /// Property kind.
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// Physical lower bound.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Physical upper bound.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Property-map key, `<region>_<kind>`.
    #[must_use]
    pub fn key(&self) -> String {
        property_key(&self.target_region, self.kind)
    }

    /// Fractional position of `physical` between the bounds.
    #[must_use]
    pub fn normalize(&self, physical: f64) -> f64 {
        (physical - self.min) / (self.max - self.min)
    }

    /// Physical value for normalized `x`, clamped to the bounds.
    ///
    /// NaN maps to the lower bound. The ends of the unit interval map to
    /// the bounds exactly.
    #[must_use]
    pub fn denormalize(&self, x: f64) -> f64 {
        if x.is_nan() || x <= 0.0 {
            return self.min;
        }
        if x >= 1.0 {
            return self.max;
        }
        x.mul_add(self.max - self.min, self.min)
            .clamp(self.min, self.max)
    }
}

/// `(physical − min) / (max − min)`.
#[must_use]
pub fn normalize(physical: f64, spec: &ParameterSpec) -> f64 {
    spec.normalize(physical)
}

/// `min + clamp(x, 0, 1) · (max − min)`.
#[must_use]
pub fn denormalize(x: f64, spec: &ParameterSpec) -> f64 {
    spec.denormalize(x)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn modulus() -> ParameterSpec {
        ParameterSpec::new("A", "RegionA", PropertyKind::Modulus, 1e5, 1e7).unwrap()
    }

    #[test]
    fn midpoint_maps_to_mean_of_bounds() {
        assert_relative_eq!(modulus().denormalize(0.5), 5.05e6);
        assert_relative_eq!(modulus().normalize(5.05e6), 0.5);
    }

    #[test]
    fn out_of_range_values_clamp() {
        let spec = modulus();
        assert_relative_eq!(denormalize(1.3, &spec), 1e7);
        assert_relative_eq!(denormalize(-0.2, &spec), 1e5);
        assert_relative_eq!(denormalize(f64::NAN, &spec), 1e5);
        assert_relative_eq!(denormalize(f64::INFINITY, &spec), 1e7);
    }

    #[test]
    fn bounds_are_validated() {
        for (min, max) in [(1.0, 1.0), (2.0, 1.0), (f64::NAN, 1.0), (0.0, f64::INFINITY)] {
            assert!(matches!(
                ParameterSpec::new("x", "R", PropertyKind::PoissonRatio, min, max),
                Err(ParamError::InvalidBounds { .. })
            ));
        }
    }

    #[test]
    fn kind_accepts_short_and_long_names() {
        assert_eq!("E".parse::<PropertyKind>().unwrap(), PropertyKind::Modulus);
        assert_eq!("PoissonRatio".parse::<PropertyKind>().unwrap(), PropertyKind::PoissonRatio);
        assert!("G".parse::<PropertyKind>().is_err());
        assert_eq!(PropertyKind::PoissonRatio.to_string(), "Nu");
    }

    #[test]
    fn deserialization_checks_bounds() {
        let ok: ParameterSpec = serde_json::from_str(
            r#"{"name":"Valve_E","target_region":"Valve","kind":"Modulus","min":2e4,"max":1e7}"#,
        )
        .unwrap();
        assert_eq!(ok.key(), "Valve_E");

        let bad = serde_json::from_str::<ParameterSpec>(
            r#"{"name":"Valve_E","target_region":"Valve","kind":"E","min":5,"max":1}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn serialization_uses_short_suffix() {
        let json = serde_json::to_string(&modulus()).unwrap();
        assert!(json.contains(r#""kind":"E""#));
    }
}
