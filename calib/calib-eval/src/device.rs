//! Deployed device (stent) variants.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Crimp and deploy lengths available for the VenusA valve frame.
pub const VENUS_A_LENGTHS: [u32; 4] = [23, 26, 29, 32];

/// Variant used when none is configured.
pub const DEFAULT_VARIANT: &str = "VenusA_L26";

/// Files describing one device variant, relative to the device root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFiles {
    /// Rest-state node file.
    pub nodes: PathBuf,
    /// Crimped node file.
    pub compressed_nodes: PathBuf,
    /// Element connectivity file.
    pub elements: PathBuf,
    /// Loading history file.
    pub history: PathBuf,
}

impl DeviceFiles {
    /// File set of the VenusA frame of the given length in millimeters.
    #[must_use]
    pub fn venus_a(length: u32) -> Self {
        Self {
            nodes: format!("VenusA{length}_Y.node").into(),
            compressed_nodes: format!("VenusA{length}_compressed_D8mm_Y.node").into(),
            elements: format!("VenusA{length}_Y.ele").into(),
            history: format!("2.0000_stent_NULL_L{length}.dat").into(),
        }
    }

    /// Same file set with every path joined onto `root`.
    #[must_use]
    pub fn resolved(&self, root: &Path) -> Self {
        Self {
            nodes: root.join(&self.nodes),
            compressed_nodes: root.join(&self.compressed_nodes),
            elements: root.join(&self.elements),
            history: root.join(&self.history),
        }
    }
}

/// Built-in variants `VenusA_L23` through `VenusA_L32`.
#[must_use]
pub fn default_device_variants() -> BTreeMap<String, DeviceFiles> {
    VENUS_A_LENGTHS
        .iter()
        .map(|&l| (format!("VenusA_L{l}"), DeviceFiles::venus_a(l)))
        .collect()
}

/// Superelastic nickel-titanium frame material (SI units, stresses in Pa).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SuperelasticMaterial {
    pub density: f64,
    pub austenite_modulus: f64,
    pub austenite_poisson_ratio: f64,
    pub martensite_modulus: f64,
    pub martensite_poisson_ratio: f64,
    /// Maximum transformation strain.
    pub transformation_strain: f64,
    /// Body temperature in °C.
    pub temperature: f64,
    pub stress_rate_austenite_to_martensite: f64,
    pub stress_rate_martensite_to_austenite: f64,
    pub reference_temperature_austenite_to_martensite: f64,
    pub reference_temperature_martensite_to_austenite: f64,
    pub loading_start_stress: f64,
    pub loading_finish_stress: f64,
    pub unloading_start_stress: f64,
    pub unloading_finish_stress: f64,
    pub compression_start_stress: f64,
}

impl Default for SuperelasticMaterial {
    fn default() -> Self {
        Self {
            density: 6450e-6,
            austenite_modulus: 78_780e6,
            austenite_poisson_ratio: 0.33,
            martensite_modulus: 27_140e6,
            martensite_poisson_ratio: 0.33,
            transformation_strain: 0.045,
            temperature: 37.0,
            stress_rate_austenite_to_martensite: 6.5,
            stress_rate_martensite_to_austenite: 6.5,
            reference_temperature_austenite_to_martensite: 37.0,
            reference_temperature_martensite_to_austenite: 37.0,
            loading_start_stress: 520e6,
            loading_finish_stress: 635e6,
            unloading_start_stress: 180e6,
            unloading_finish_stress: 26e6,
            compression_start_stress: 520e6,
        }
    }
}

/// Contact settings between the device and tissue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactSettings {
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Velocity damping factor per step.
    pub damping: f64,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            friction: 0.2,
            damping: 0.97,
        }
    }
}

/// A resolved device ready to hand to the solver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceModel {
    /// Variant tag.
    pub variant: String,
    /// Absolute file paths.
    pub files: DeviceFiles,
    /// Frame material.
    pub material: SuperelasticMaterial,
    /// Contact settings.
    pub contact: ContactSettings,
}

impl DeviceModel {
    /// Look up `variant` in `variants` and resolve its files under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownVariant`] if the tag is not listed.
    pub fn resolve(
        variant: &str,
        variants: &BTreeMap<String, DeviceFiles>,
        root: &Path,
    ) -> ConfigResult<Self> {
        let files = variants
            .get(variant)
            .ok_or_else(|| ConfigError::UnknownVariant(variant.to_owned()))?;
        Ok(Self {
            variant: variant.to_owned(),
            files: files.resolved(root),
            material: SuperelasticMaterial::default(),
            contact: ContactSettings::default(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_variants_cover_all_lengths() {
        let variants = default_device_variants();
        assert_eq!(
            variants.keys().map(String::as_str).collect::<Vec<_>>(),
            ["VenusA_L23", "VenusA_L26", "VenusA_L29", "VenusA_L32"]
        );
        assert_eq!(
            variants["VenusA_L29"].compressed_nodes,
            PathBuf::from("VenusA29_compressed_D8mm_Y.node")
        );
        assert!(variants.contains_key(DEFAULT_VARIANT));
    }

    #[test]
    fn resolve_joins_device_root() {
        let device =
            DeviceModel::resolve("VenusA_L32", &default_device_variants(), Path::new("/lib/stent"))
                .unwrap();
        assert_eq!(device.files.elements, PathBuf::from("/lib/stent/VenusA32_Y.ele"));
        assert_eq!(
            device.files.history,
            PathBuf::from("/lib/stent/2.0000_stent_NULL_L32.dat")
        );
        assert!((device.contact.friction - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_variant_is_a_config_error() {
        let err = DeviceModel::resolve("Evolut_34", &default_device_variants(), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariant(v) if v == "Evolut_34"));
    }
}
