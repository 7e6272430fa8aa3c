//! Calibration run configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use calib_discrepancy::{RegistrationSettings, ScoringMode, SliceSettings, SliceTarget};
use calib_material::{DEFAULT_PARTITION_KEYWORDS, DEFAULT_SEARCH_RADIUS, MaterialMapper};
use calib_params::{
    AlwaysAppliedRegion, DEFAULT_POISSON_RATIO, ParameterSpace, ParameterSpec, SENTINEL_COST,
};
use calib_supervisor::{DEFAULT_TIMEOUT, WorkerCommand, WorkerHeader};
use serde::{Deserialize, Serialize};

use crate::device::{DEFAULT_VARIANT, DeviceFiles, DeviceModel, default_device_variants};
use crate::error::{ConfigError, ConfigResult};

/// Solver result surface, relative to the output root.
pub const DEFAULT_SIMULATED_SURFACE: &str = "output/Obj/14.0000_stent.obj";

/// Iteration log file name, relative to the output root.
pub const DEFAULT_LOG_FILE: &str = "optimization_log.csv";

/// Modulus export file name, relative to the output root.
pub const MODULUS_EXPORT_FILE: &str = "elastic_modulus.dat";

/// Material for tissue elements that no region claims.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticMaterial {
    /// Young's modulus in Pa.
    pub modulus: f64,
    /// Poisson ratio.
    #[serde(default = "default_poisson_ratio")]
    pub poisson_ratio: f64,
}

impl Default for ElasticMaterial {
    fn default() -> Self {
        Self {
            modulus: 1.0e6,
            poisson_ratio: DEFAULT_POISSON_RATIO,
        }
    }
}

/// One spatial region: a closed surface and its priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Region name, the prefix of its property keys.
    pub name: String,
    /// Surface file, relative to the mesh root.
    pub surface: PathBuf,
    /// Higher wins where regions overlap.
    pub priority: i32,
}

impl RegionConfig {
    /// Region whose surface is `<name>.stl`.
    #[must_use]
    pub fn stl(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_owned(),
            surface: PathBuf::from(format!("{name}.stl")),
            priority,
        }
    }
}

/// Scoring settings plus the solver surface they read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Solver result surface, relative to the output root.
    #[serde(default = "default_simulated_surface")]
    pub simulated_surface: PathBuf,
    /// Mode and mode-specific settings.
    #[serde(flatten)]
    pub mode: ScoringMode,
}

/// How the host launches workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker executable.
    #[serde(default = "default_worker_program")]
    pub program: PathBuf,
    /// Arguments placed before the artifact paths.
    #[serde(default)]
    pub args: Vec<String>,
    /// Wall-clock budget per evaluation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Parent of per-evaluation directories; the output root when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: default_worker_program(),
            args: Vec::new(),
            timeout_ms: default_timeout_ms(),
            scratch_dir: None,
        }
    }
}

/// External structural solver command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Solver executable.
    pub program: PathBuf,
    /// Arguments placed before the job file path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Wall-clock budget per solve; the worker budget when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Reference optimizer engines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Separable CMA-ES, ask/tell.
    #[default]
    Cmaes,
    /// Latin hypercube design plus local search, direct callback.
    Lhs,
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Engine to run.
    #[serde(default)]
    pub engine: EngineKind,
    /// Initial step size in normalized units.
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// Candidates per generation; engine default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<usize>,
    /// Generation ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_generations: Option<usize>,
    /// Evaluation ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_evaluations: Option<usize>,
    /// Random seed.
    #[serde(default)]
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            sigma: default_sigma(),
            population: None,
            max_generations: None,
            max_evaluations: None,
            seed: 0,
        }
    }
}

/// Plausibility window for accepting a new best.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestConfig {
    /// Costs at or above this are never accepted.
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
    /// Costs below this are treated as scoring artifacts.
    #[serde(default)]
    pub floor: f64,
}

impl Default for BestConfig {
    fn default() -> Self {
        Self {
            ceiling: default_ceiling(),
            floor: 0.0,
        }
    }
}

/// Complete description of a calibration run.
///
/// Loaded from JSON. Only `mesh_root`, `output_root`, `tissue_mesh` and
/// `scoring` are mandatory; everything else defaults to the aortic-root
/// setup with three regions and five moduli.
///
/// # Example
///
/// ```
/// use calib_eval::CalibrationConfig;
///
/// let config: CalibrationConfig = serde_json::from_str(r#"{
///     "mesh_root": "/data/meshes",
///     "output_root": "/data/output",
///     "tissue_mesh": "vessel.inp",
///     "scoring": { "mode": "registration", "truth_surface": "truth.stl" }
/// }"#).unwrap();
///
/// assert_eq!(config.variant, "VenusA_L26");
/// assert_eq!(config.parameters.len(), 5);
/// assert_eq!(config.worker.timeout_ms, 900_000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Patient mesh directory.
    pub mesh_root: PathBuf,
    /// Directory the solver writes into.
    pub output_root: PathBuf,
    /// Device variant tag.
    #[serde(default = "default_variant")]
    pub variant: String,
    /// Device library directory, relative to the mesh root.
    #[serde(default = "default_device_root")]
    pub device_root: PathBuf,
    /// Device file sets by variant tag.
    #[serde(default = "default_device_variants")]
    pub device_variants: BTreeMap<String, DeviceFiles>,
    /// Tissue volume mesh, relative to the mesh root.
    pub tissue_mesh: PathBuf,
    /// Pre-expanded tissue mesh, relative to the mesh root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_tissue_mesh: Option<PathBuf>,
    /// Material of unclaimed tissue elements.
    #[serde(default)]
    pub default_material: ElasticMaterial,
    /// Regions applied to whole element sets.
    #[serde(default = "AlwaysAppliedRegion::defaults")]
    pub always_applied: Vec<AlwaysAppliedRegion>,
    /// Part-name keywords of elements eligible for spatial assignment.
    #[serde(default = "default_partition_keywords")]
    pub partition_keywords: Vec<String>,
    /// Spatial regions.
    #[serde(default = "default_regions")]
    pub regions: Vec<RegionConfig>,
    /// Calibrated parameters, in optimizer order.
    #[serde(default = "default_parameters")]
    pub parameters: Vec<ParameterSpec>,
    /// Centroid-to-surface distance for region membership.
    #[serde(default = "default_search_radius")]
    pub search_radius: f64,
    /// Geometric scoring.
    pub scoring: ScoringConfig,
    /// Worker launch settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// External solver; required for in-process evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverConfig>,
    /// Optimizer settings.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Iteration log, relative to the output root.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Best-result plausibility window.
    #[serde(default)]
    pub best: BestConfig,
    /// Write the per-node modulus file each evaluation.
    #[serde(default = "default_true")]
    pub export_modulus: bool,
}

impl CalibrationConfig {
    /// Read a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check settings that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: invalid parameters, an unknown
    /// variant, a missing ground-truth surface in registration mode, no
    /// slice targets in slice mode, or an out-of-range setting.
    pub fn validate(&self) -> ConfigResult<()> {
        self.parameter_space()?;
        self.device()?;

        let radius_ok = self.search_radius.is_finite() && self.search_radius >= 0.0;
        if !radius_ok {
            return Err(ConfigError::Invalid(format!(
                "search_radius must be a non-negative number, got {}",
                self.search_radius
            )));
        }
        if self.worker.timeout_ms == 0 {
            return Err(ConfigError::Invalid("worker.timeout_ms must be positive".into()));
        }
        let window_ok = self.best.floor < self.best.ceiling;
        if !window_ok {
            return Err(ConfigError::Invalid(format!(
                "best.floor {} must be below best.ceiling {}",
                self.best.floor, self.best.ceiling
            )));
        }
        let sigma_ok = self.optimizer.sigma.is_finite() && self.optimizer.sigma > 0.0;
        if !sigma_ok {
            return Err(ConfigError::Invalid("optimizer.sigma must be positive".into()));
        }
        if let Some(name) = duplicate(self.regions.iter().map(|r| r.name.as_str())) {
            return Err(ConfigError::Invalid(format!("region '{name}' listed twice")));
        }

        match &self.scoring.mode {
            ScoringMode::Registration(settings) => {
                let truth = self.mesh_path(&settings.truth_surface);
                if !truth.is_file() {
                    return Err(ConfigError::MissingGroundTruth(truth));
                }
            }
            ScoringMode::Slices(settings) => {
                if settings.targets.is_empty() {
                    return Err(ConfigError::Invalid("slice scoring needs targets".into()));
                }
                if settings.axis_vector().norm() == 0.0 {
                    return Err(ConfigError::Invalid("slice axis must be non-zero".into()));
                }
            }
        }
        Ok(())
    }

    /// Check that the inputs every evaluation needs exist: the mesh root,
    /// the tissue decks, each region surface and the program that will be
    /// run, which is the solver when `in_process` and the worker otherwise.
    ///
    /// Bare program names are looked up on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingInput`] for the first missing input.
    pub fn check_inputs(&self, in_process: bool) -> ConfigResult<()> {
        if !self.mesh_root.is_dir() {
            return Err(missing("mesh root", &self.mesh_root));
        }
        let decks = std::iter::once(("tissue mesh", &self.tissue_mesh))
            .chain(self.expanded_tissue_mesh.iter().map(|p| ("expanded tissue mesh", p)))
            .chain(self.regions.iter().map(|r| ("region surface", &r.surface)));
        for (what, relative) in decks {
            let path = self.mesh_path(relative);
            if !path.is_file() {
                return Err(missing(what, &path));
            }
        }

        let program = if in_process {
            self.solver.as_ref().map(|s| ("solver", &s.program))
        } else {
            Some(("worker program", &self.worker.program))
        };
        if let Some((what, program)) = program {
            if find_program(program).is_none() {
                return Err(missing(what, program));
            }
        }
        Ok(())
    }

    /// Path under the mesh root; absolute paths pass through.
    #[must_use]
    pub fn mesh_path(&self, relative: &Path) -> PathBuf {
        self.mesh_root.join(relative)
    }

    /// Path under the output root; absolute paths pass through.
    #[must_use]
    pub fn output_path(&self, relative: &Path) -> PathBuf {
        self.output_root.join(relative)
    }

    /// Ordered parameter space.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate names or keys.
    pub fn parameter_space(&self) -> ConfigResult<ParameterSpace> {
        Ok(ParameterSpace::new(self.parameters.clone())?)
    }

    /// Resolved device model.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownVariant`] if the tag is not listed.
    pub fn device(&self) -> ConfigResult<DeviceModel> {
        DeviceModel::resolve(
            &self.variant,
            &self.device_variants,
            &self.mesh_path(&self.device_root),
        )
    }

    /// Scoring mode with paths resolved against the roots.
    #[must_use]
    pub fn scoring_mode(&self) -> ScoringMode {
        match &self.scoring.mode {
            ScoringMode::Registration(settings) => ScoringMode::Registration(RegistrationSettings {
                truth_surface: self.mesh_path(&settings.truth_surface),
                save_aligned: settings.save_aligned.as_deref().map(|p| self.output_path(p)),
                icp_iterations: settings.icp_iterations,
            }),
            ScoringMode::Slices(settings) => ScoringMode::Slices(settings.clone()),
        }
    }

    /// Solver result surface.
    #[must_use]
    pub fn simulated_surface(&self) -> PathBuf {
        self.output_path(&self.scoring.simulated_surface)
    }

    /// Iteration log path.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.output_path(&self.log_path)
    }

    /// Mapper with every configured region registered, not yet initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if a region name repeats.
    pub fn material_mapper(&self) -> calib_material::MaterialResult<MaterialMapper> {
        let mut mapper = MaterialMapper::new()
            .with_always_applied(self.always_applied.clone())
            .with_partition_keywords(self.partition_keywords.clone());
        for region in &self.regions {
            mapper.add_region(region.name.clone(), self.mesh_path(&region.surface), region.priority)?;
        }
        Ok(mapper)
    }

    /// Environment header sent to workers.
    #[must_use]
    pub fn worker_header(&self) -> WorkerHeader {
        WorkerHeader::new(&self.mesh_root, &self.output_root, &self.variant)
    }

    /// Worker command line.
    #[must_use]
    pub fn worker_command(&self) -> WorkerCommand {
        WorkerCommand::new(&self.worker.program).with_args(self.worker.args.iter().cloned())
    }

    /// Worker scratch directory.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.worker
            .scratch_dir
            .as_deref()
            .map_or_else(|| self.output_root.clone(), |p| self.output_path(p))
    }

    /// Copy with the environment replaced by a worker header.
    #[must_use]
    pub fn with_header(mut self, header: &WorkerHeader) -> Self {
        self.mesh_root.clone_from(&header.mesh_root);
        self.output_root.clone_from(&header.output_root);
        self.variant.clone_from(&header.variant);
        self
    }
}

fn duplicate<'a>(mut names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = BTreeSet::new();
    names.find(|n| !seen.insert(*n))
}

/// The three regions of the aortic root, most specific first.
#[must_use]
pub fn default_regions() -> Vec<RegionConfig> {
    vec![
        RegionConfig::stl("AorticAnnulus", 10),
        RegionConfig::stl("AortomitralCurtain", 5),
        RegionConfig::stl("LeftVentricular", 1),
    ]
}

/// Measured cross-sections of the reference patient, along +Y.
#[must_use]
pub fn reference_slice_targets() -> SliceSettings {
    SliceSettings::along_y(vec![
        SliceTarget {
            height: -5.0,
            long_axis: 16.97,
            short_axis: 14.52,
            area: 775.1,
            circumference: 99.1,
        },
        SliceTarget {
            height: 20.5,
            long_axis: 13.52,
            short_axis: 11.55,
            area: 491.0,
            circumference: 78.9,
        },
        SliceTarget {
            height: 35.6,
            long_axis: 19.23,
            short_axis: 18.68,
            area: 1129.5,
            circumference: 119.1,
        },
    ])
}

fn default_parameters() -> Vec<ParameterSpec> {
    ParameterSpace::aortic_root().specs().to_vec()
}

fn default_partition_keywords() -> Vec<String> {
    DEFAULT_PARTITION_KEYWORDS.map(String::from).to_vec()
}

fn default_variant() -> String {
    DEFAULT_VARIANT.to_owned()
}

fn default_device_root() -> PathBuf {
    PathBuf::from("stent")
}

fn default_simulated_surface() -> PathBuf {
    PathBuf::from(DEFAULT_SIMULATED_SURFACE)
}

fn default_log_path() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn missing(what: &'static str, path: &Path) -> ConfigError {
    ConfigError::MissingInput {
        what,
        path: path.to_path_buf(),
    }
}

/// Resolve a program the way a spawn would: paths as given, bare names
/// through `PATH`.
fn find_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    std::env::var_os("PATH")
        .iter()
        .flat_map(std::env::split_paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn default_worker_program() -> PathBuf {
    PathBuf::from("calib-worker")
}

fn default_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

const fn default_search_radius() -> f64 {
    DEFAULT_SEARCH_RADIUS
}

const fn default_poisson_ratio() -> f64 {
    DEFAULT_POISSON_RATIO
}

const fn default_sigma() -> f64 {
    0.2
}

const fn default_ceiling() -> f64 {
    SENTINEL_COST
}

const fn default_true() -> bool {
    true
}
