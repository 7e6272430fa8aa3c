//! The ordered parameter list and vector conversions.

use std::sync::Arc;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::property::PropertyMap;
use crate::spec::{ParameterSpec, PropertyKind};
use crate::{ParamError, ParamResult};

/// Ordered, immutable list of parameters.
///
/// Order defines the optimization vector layout. The list is reference
/// counted so every component can hold it without copying.
///
/// # Example
///
/// ```
/// use calib_params::{ParameterSpace, ParameterSpec, PropertyKind};
///
/// let space = ParameterSpace::new(vec![
///     ParameterSpec::new("A", "RegionA", PropertyKind::Modulus, 1e5, 1e7).unwrap(),
/// ])
/// .unwrap();
///
/// let map = space.property_map(&[0.5]).unwrap();
/// assert_eq!(map.get("RegionA_Modulus"), Some(5.05e6));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    specs: Arc<[ParameterSpec]>,
}

impl ParameterSpace {
    /// Build from specs.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Duplicate`] if two specs share a name or a
    /// property key.
    pub fn new(specs: Vec<ParameterSpec>) -> ParamResult<Self> {
        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        for spec in &specs {
            if !names.insert(spec.name().to_string()) {
                return Err(ParamError::Duplicate(spec.name().to_string()));
            }
            let key = spec.key();
            if !keys.insert(key.clone()) {
                return Err(ParamError::Duplicate(key));
            }
        }
        Ok(Self {
            specs: specs.into(),
        })
    }

    /// Number of parameters.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.specs.len()
    }

    /// The specs in vector order.
    #[must_use]
    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    /// Parameter names in vector order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(ParameterSpec::name)
    }

    fn check(&self, len: usize) -> ParamResult<()> {
        if len == self.dimension() {
            Ok(())
        } else {
            Err(ParamError::DimensionMismatch {
                expected: self.dimension(),
                got: len,
            })
        }
    }

    /// Normalize a physical vector.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::DimensionMismatch`] on a length mismatch.
    pub fn normalize_all(&self, physical: &[f64]) -> ParamResult<Vec<f64>> {
        self.check(physical.len())?;
        Ok(self
            .specs
            .iter()
            .zip(physical)
            .map(|(s, &p)| s.normalize(p))
            .collect())
    }

    /// Denormalize a unit-cube vector, clamping every component.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::DimensionMismatch`] on a length mismatch.
    pub fn denormalize_all(&self, normalized: &[f64]) -> ParamResult<Vec<f64>> {
        self.check(normalized.len())?;
        Ok(self
            .specs
            .iter()
            .zip(normalized)
            .map(|(s, &x)| s.denormalize(x))
            .collect())
    }

    /// Clamp each component into `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::DimensionMismatch`] on a length mismatch.
    pub fn clamp_unit(&self, normalized: &[f64]) -> ParamResult<Vec<f64>> {
        self.check(normalized.len())?;
        Ok(normalized.iter().map(|&x| clamp_unit(x)).collect())
    }

    /// Property map for a normalized vector.
    ///
    /// `Vessel_*` entries are mirrored onto `Default_*`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::DimensionMismatch`] on a length mismatch.
    pub fn property_map(&self, normalized: &[f64]) -> ParamResult<PropertyMap> {
        let physical = self.denormalize_all(normalized)?;
        Ok(self.property_map_physical(&physical))
    }

    /// Property map for an already denormalized vector of matching length.
    #[must_use]
    pub fn property_map_physical(&self, physical: &[f64]) -> PropertyMap {
        let mut map: PropertyMap = self
            .specs
            .iter()
            .zip(physical)
            .map(|(s, &v)| (s.key(), v))
            .collect();
        map.mirror_vessel_to_default();
        map
    }

    /// The aortic-root stiffness set used for valve deployment calibration.
    ///
    /// Two non-spatial regions (`Aorta`, `Valve`) and three spatial ones,
    /// all Young's moduli in pascals.
    #[must_use]
    pub fn aortic_root() -> Self {
        let raw = [
            ("Aorta_E", "Aorta", 0.1e6, 10e6),
            ("Valve_E", "Valve", 0.02e6, 10e6),
            ("AorticAnnulus_E", "AorticAnnulus", 0.1e6, 40e6),
            ("AortomitralCurtain_E", "AortomitralCurtain", 0.02e6, 10e6),
            ("LeftVentricular_E", "LeftVentricular", 0.1e6, 50e6),
        ];
        let specs = raw
            .into_iter()
            .filter_map(|(name, region, min, max)| {
                ParameterSpec::new(name, region, PropertyKind::Modulus, min, max).ok()
            })
            .collect::<Vec<_>>();
        Self {
            specs: specs.into(),
        }
    }
}

/// Clamp into `[0, 1]`; NaN becomes 0.
#[must_use]
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// A region whose material applies to a fixed element set, bypassing
/// geometric lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlwaysAppliedRegion {
    /// Region name, as used in property keys.
    pub region: String,
    /// Element set receiving the material.
    pub element_set: String,
}

impl AlwaysAppliedRegion {
    /// Pair a region with an element set.
    #[must_use]
    pub fn new(region: impl Into<String>, element_set: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            element_set: element_set.into(),
        }
    }

    /// `Aorta → ES_AORTA` and `Valve → ES_AORTICVALVE`.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Aorta", "ES_AORTA"),
            Self::new("Valve", "ES_AORTICVALVE"),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterSpec::new("Vessel_E", "Vessel", PropertyKind::Modulus, 1e5, 1e7).unwrap(),
            ParameterSpec::new("Vessel_Nu", "Vessel", PropertyKind::PoissonRatio, 0.3, 0.49)
                .unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        assert!(matches!(
            space().denormalize_all(&[0.5]),
            Err(ParamError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
        assert!(space().property_map(&[0.1, 0.2, 0.3]).is_err());
        assert!(space().clamp_unit(&[]).is_err());
    }

    #[test]
    fn property_map_clamps_and_mirrors() {
        let map = space().property_map(&[1.7, 0.0]).unwrap();
        assert_relative_eq!(map.get("Vessel_E").unwrap(), 1e7);
        assert_relative_eq!(map.get("Default_E").unwrap(), 1e7);
        assert_relative_eq!(map.poisson_for("Default"), 0.3);
    }

    #[test]
    fn duplicates_are_rejected() {
        let spec = ParameterSpec::new("A", "R", PropertyKind::Modulus, 0.0, 1.0).unwrap();
        let same_key = ParameterSpec::new("B", "R", PropertyKind::Modulus, 0.0, 2.0).unwrap();
        assert!(ParameterSpace::new(vec![spec.clone(), spec.clone()]).is_err());
        assert!(matches!(
            ParameterSpace::new(vec![spec, same_key]),
            Err(ParamError::Duplicate(k)) if k == "R_E"
        ));
    }

    #[test]
    fn clamp_unit_handles_overshoot() {
        assert_eq!(space().clamp_unit(&[-0.1, f64::NAN]).unwrap(), vec![0.0, 0.0]);
        assert_relative_eq!(clamp_unit(1.0000001), 1.0);
    }

    #[test]
    fn aortic_root_has_five_moduli() {
        let space = ParameterSpace::aortic_root();
        assert_eq!(space.dimension(), 5);
        assert_eq!(space.names().next(), Some("Aorta_E"));
        assert!(space.specs().iter().all(|s| s.kind() == PropertyKind::Modulus));
    }
}
