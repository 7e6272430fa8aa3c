//! Per-evaluation property maps.

use hashbrown::HashMap;

use crate::spec::{PropertyKind, property_key};

/// Poisson's ratio used when a region has no explicit `<region>_Nu` entry.
pub const DEFAULT_POISSON_RATIO: f64 = 0.4;

/// Region whose values are mirrored onto the solver's default material.
pub const VESSEL_REGION: &str = "Vessel";

/// Region name of the solver's default material.
pub const DEFAULT_REGION: &str = "Default";

/// Physical values keyed `<region>_<kind>`.
///
/// Built fresh for every evaluation and dropped at its end. Lookups accept
/// the long kind names too, so `RegionA_Modulus` finds `RegionA_E`.
///
/// # Example
///
/// ```
/// use calib_params::{DEFAULT_POISSON_RATIO, PropertyMap};
///
/// let mut map = PropertyMap::new();
/// map.insert("Aorta_E", 2.0e6);
///
/// assert_eq!(map.get("Aorta_Modulus"), Some(2.0e6));
/// assert_eq!(map.poisson_for("Aorta"), DEFAULT_POISSON_RATIO);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    values: HashMap<String, f64>,
}

impl PropertyMap {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value. Long kind names are canonicalized.
    pub fn insert(&mut self, key: impl AsRef<str>, value: f64) {
        self.values.insert(canonical_key(key.as_ref()), value);
    }

    /// Value for `key`, accepting either kind spelling.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(&canonical_key(key)).copied()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Value of `kind` for `region`.
    #[must_use]
    pub fn value(&self, region: &str, kind: PropertyKind) -> Option<f64> {
        self.values.get(&property_key(region, kind)).copied()
    }

    /// Young's modulus for `region`, if present.
    #[must_use]
    pub fn modulus(&self, region: &str) -> Option<f64> {
        self.value(region, PropertyKind::Modulus)
    }

    /// Poisson's ratio for `region`, or [`DEFAULT_POISSON_RATIO`].
    #[must_use]
    pub fn poisson_for(&self, region: &str) -> f64 {
        self.value(region, PropertyKind::PoissonRatio)
            .unwrap_or(DEFAULT_POISSON_RATIO)
    }

    /// `(E, ν)` for `region` when its modulus is present.
    #[must_use]
    pub fn elastic(&self, region: &str) -> Option<(f64, f64)> {
        self.modulus(region).map(|e| (e, self.poisson_for(region)))
    }

    /// Copy `Vessel_*` entries onto `Default_*`.
    pub fn mirror_vessel_to_default(&mut self) {
        for kind in [PropertyKind::Modulus, PropertyKind::PoissonRatio] {
            if let Some(v) = self.value(VESSEL_REGION, kind) {
                self.values.insert(property_key(DEFAULT_REGION, kind), v);
            }
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: AsRef<str>> FromIterator<(K, f64)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

fn canonical_key(key: &str) -> String {
    for (long, kind) in [
        ("_Modulus", PropertyKind::Modulus),
        ("_PoissonRatio", PropertyKind::PoissonRatio),
    ] {
        if let Some(region) = key.strip_suffix(long) {
            return property_key(region, kind);
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_and_short_keys_are_equivalent() {
        let mut map = PropertyMap::new();
        map.insert("Plaque_PoissonRatio", 0.45);
        assert_eq!(map.get("Plaque_Nu"), Some(0.45));
        assert_eq!(map.poisson_for("Plaque"), 0.45);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn modulus_without_ratio_uses_default() {
        let map: PropertyMap = [("LeftVentricular_E", 3.0e6)].into_iter().collect();
        assert_eq!(map.elastic("LeftVentricular"), Some((3.0e6, DEFAULT_POISSON_RATIO)));
        assert_eq!(map.elastic("Aorta"), None);
    }

    #[test]
    fn vessel_values_mirror_to_default() {
        let mut map: PropertyMap = [("Vessel_E", 1.5e6), ("Vessel_Nu", 0.45)].into_iter().collect();
        map.mirror_vessel_to_default();
        assert_eq!(map.get("Default_E"), Some(1.5e6));
        assert_eq!(map.get("Default_Nu"), Some(0.45));
    }

    #[test]
    fn mirroring_without_vessel_is_a_noop() {
        let mut map: PropertyMap = [("Aorta_E", 1.0)].into_iter().collect();
        map.mirror_vessel_to_default();
        assert_eq!(map.len(), 1);
        assert!(!map.contains("Default_E"));
    }
}
