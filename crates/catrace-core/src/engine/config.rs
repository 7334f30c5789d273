use crate::core::utils::minimize::NelderMeadOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be a positive number, got {value}")))
    }
}

fn require_nonzero(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(invalid(name, "must be at least 1"))
    } else {
        Ok(())
    }
}

/// Parameters of the greedy confidence walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct WalkConfig {
    /// A global seed at or below this Ca confidence ends the walk.
    pub min_start_confidence: f32,
    /// Half-width of the cube searched around the seed, in voxels.
    pub search_radius: i32,
    pub min_distance: f64,
    pub max_distance: f64,
    /// Candidates closer than this to nearby trace points are rejected.
    pub exclusion_radius: f64,
    /// Number of trace points on each side of the seed checked for exclusion.
    pub exclusion_span: usize,
    pub max_bfs_steps: usize,
    /// Minimum angle (degrees) at the seed between the previous step and the candidate.
    pub min_bend_angle: f64,
    pub cylinder_radius: f64,
    pub cylinder_samples: usize,
    /// Radius of the ball zeroed in the working copy around a consumed voxel.
    pub zero_radius: f64,
    pub max_iterations: usize,
    pub snap_distance: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            min_start_confidence: 8.0,
            search_radius: 5,
            min_distance: 3.0,
            max_distance: 4.5,
            exclusion_radius: 3.0,
            exclusion_span: 5,
            max_bfs_steps: 8,
            min_bend_angle: 70.0,
            cylinder_radius: 1.0,
            cylinder_samples: 11,
            zero_radius: 3.0,
            max_iterations: 1_000_000,
            snap_distance: 3.0,
        }
    }
}

impl WalkConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.search_radius < 1 {
            return Err(invalid("walk.search-radius", "must be at least 1"));
        }
        require_positive("walk.min-distance", self.min_distance)?;
        require_positive("walk.max-distance", self.max_distance)?;
        if self.min_distance > self.max_distance {
            return Err(invalid(
                "walk.min-distance",
                format!(
                    "{} exceeds max-distance {}",
                    self.min_distance, self.max_distance
                ),
            ));
        }
        if self.max_distance > self.search_radius as f64 * 3f64.sqrt() {
            return Err(invalid(
                "walk.max-distance",
                "is not reachable inside the search cube",
            ));
        }
        require_positive("walk.exclusion-radius", self.exclusion_radius)?;
        require_nonzero("walk.max-bfs-steps", self.max_bfs_steps)?;
        if !(0.0..=180.0).contains(&self.min_bend_angle) {
            return Err(invalid("walk.min-bend-angle", "must lie within [0, 180]"));
        }
        require_positive("walk.cylinder-radius", self.cylinder_radius)?;
        require_nonzero("walk.cylinder-samples", self.cylinder_samples)?;
        require_positive("walk.zero-radius", self.zero_radius)?;
        require_nonzero("walk.max-iterations", self.max_iterations)?;
        require_positive("walk.snap-distance", self.snap_distance)
    }
}

/// Parameters of the graph topology repair passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct RefineConfig {
    pub density_radius: f64,
    pub density_samples: usize,
    /// Longest loop side (in nodes) that may be severed.
    pub max_loop_side: usize,
    /// Longest branch (in nodes) treated as a side chain.
    pub max_side_chain_length: usize,
    /// Required length difference between the shortest and second-shortest branch.
    pub min_side_chain_margin: usize,
    pub max_tail_loop: usize,
    /// How many times each refinement pass repeats its operator sequence.
    pub rounds: usize,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            density_radius: 1.0,
            density_samples: 11,
            max_loop_side: 4,
            max_side_chain_length: 3,
            min_side_chain_margin: 3,
            max_tail_loop: 4,
            rounds: 2,
        }
    }
}

impl RefineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("refine.density-radius", self.density_radius)?;
        require_nonzero("refine.density-samples", self.density_samples)?;
        require_nonzero("refine.rounds", self.rounds)
    }
}

/// Parameters of the backbone mask built from the refined graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct MaskConfig {
    pub radius: f64,
    pub samples: usize,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            radius: 2.0,
            samples: 11,
        }
    }
}

impl MaskConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("mask.radius", self.radius)?;
        require_nonzero("mask.samples", self.samples)
    }
}

/// Parameters of the idealized helix fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct HelixConfig {
    pub min_helix_length: usize,
    pub interval_size: usize,
    pub min_interval_size: usize,
    /// Helix radius in Å.
    pub radius: f64,
    /// Angular frequency per Å along the axis.
    pub pitch: f64,
    /// Axial rise per residue in Å.
    pub gap: f64,
    pub flatten: usize,
    pub max_bend_angle: f64,
    pub bend_window: usize,
    pub min_offset: f64,
    pub max_offset: f64,
    pub max_splits: usize,
    pub max_optimizer_iterations: usize,
}

impl Default for HelixConfig {
    fn default() -> Self {
        Self {
            min_helix_length: 10,
            interval_size: 9,
            min_interval_size: 3,
            radius: 2.11,
            pitch: 1.149,
            gap: 1.498,
            flatten: 4,
            max_bend_angle: 80.0,
            bend_window: 3,
            min_offset: 0.8,
            max_offset: 1.7,
            max_splits: 64,
            max_optimizer_iterations: 400,
        }
    }
}

impl HelixConfig {
    /// Original points kept at each edge of an accepted span.
    pub fn kept_edge_points(&self) -> usize {
        self.min_interval_size.saturating_sub(1) / 2
    }

    pub fn optimizer_options(&self) -> NelderMeadOptions {
        NelderMeadOptions {
            max_iterations: self.max_optimizer_iterations,
            ..NelderMeadOptions::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("helix.min-interval-size", self.min_interval_size)?;
        if self.interval_size < self.min_interval_size {
            return Err(invalid(
                "helix.interval-size",
                "must not be smaller than min-interval-size",
            ));
        }
        require_positive("helix.radius", self.radius)?;
        require_positive("helix.pitch", self.pitch)?;
        require_positive("helix.gap", self.gap)?;
        require_nonzero("helix.flatten", self.flatten)?;
        require_nonzero("helix.bend-window", self.bend_window)?;
        if self.min_offset > self.max_offset {
            return Err(invalid("helix.min-offset", "exceeds max-offset"));
        }
        Ok(())
    }
}

/// The complete parameter set of one tracing run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TracingConfig {
    pub walk: WalkConfig,
    pub refine: RefineConfig,
    pub mask: MaskConfig,
    pub helix: HelixConfig,
    /// Zero Ca confidence outside the input mask before the first walk.
    pub use_mask: bool,
}

impl TracingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.walk.validate()?;
        self.refine.validate()?;
        self.mask.validate()?;
        self.helix.validate()
    }
}

#[derive(Default)]
pub struct TracingConfigBuilder {
    walk: Option<WalkConfig>,
    refine: Option<RefineConfig>,
    mask: Option<MaskConfig>,
    helix: Option<HelixConfig>,
    use_mask: Option<bool>,
}

impl TracingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn walk(mut self, config: WalkConfig) -> Self {
        self.walk = Some(config);
        self
    }
    pub fn refine(mut self, config: RefineConfig) -> Self {
        self.refine = Some(config);
        self
    }
    pub fn mask(mut self, config: MaskConfig) -> Self {
        self.mask = Some(config);
        self
    }
    pub fn helix(mut self, config: HelixConfig) -> Self {
        self.helix = Some(config);
        self
    }
    pub fn use_mask(mut self, enabled: bool) -> Self {
        self.use_mask = Some(enabled);
        self
    }

    /// Fills unset sections with defaults and validates the result.
    pub fn build(self) -> Result<TracingConfig, ConfigError> {
        let config = TracingConfig {
            walk: self.walk.unwrap_or_default(),
            refine: self.refine.unwrap_or_default(),
            mask: self.mask.unwrap_or_default(),
            helix: self.helix.unwrap_or_default(),
            use_mask: self.use_mask.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_with_no_sections_yields_defaults() {
        let config = TracingConfigBuilder::new().build().unwrap();
        assert_eq!(config, TracingConfig::default());
        assert_eq!(config.walk.min_start_confidence, 8.0);
        assert_eq!(config.helix.max_splits, 64);
        assert!(!config.use_mask);
    }

    #[test]
    fn builder_keeps_explicit_sections() {
        let walk = WalkConfig {
            max_iterations: 10,
            ..WalkConfig::default()
        };
        let config = TracingConfigBuilder::new()
            .walk(walk.clone())
            .use_mask(true)
            .build()
            .unwrap();
        assert_eq!(config.walk, walk);
        assert!(config.use_mask);
    }

    #[test]
    fn inverted_distance_band_is_rejected() {
        let walk = WalkConfig {
            min_distance: 5.0,
            max_distance: 4.0,
            ..WalkConfig::default()
        };
        let err = TracingConfigBuilder::new().walk(walk).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "walk.min-distance",
                ..
            }
        ));
    }

    #[test]
    fn unreachable_max_distance_is_rejected() {
        let walk = WalkConfig {
            search_radius: 1,
            ..WalkConfig::default()
        };
        assert!(TracingConfigBuilder::new().walk(walk).build().is_err());
    }

    #[test]
    fn zero_and_non_finite_values_are_rejected() {
        let helix = HelixConfig {
            gap: f64::NAN,
            ..HelixConfig::default()
        };
        assert!(TracingConfigBuilder::new().helix(helix).build().is_err());

        let mask = MaskConfig {
            samples: 0,
            ..MaskConfig::default()
        };
        assert!(TracingConfigBuilder::new().mask(mask).build().is_err());

        let refine = RefineConfig {
            rounds: 0,
            ..RefineConfig::default()
        };
        assert!(TracingConfigBuilder::new().refine(refine).build().is_err());
    }

    #[test]
    fn interval_sizes_must_be_ordered() {
        let helix = HelixConfig {
            interval_size: 2,
            ..HelixConfig::default()
        };
        assert!(TracingConfigBuilder::new().helix(helix).build().is_err());
    }

    #[test]
    fn default_helix_keeps_one_edge_point() {
        assert_eq!(HelixConfig::default().kept_edge_points(), 1);
        assert_eq!(
            HelixConfig::default().optimizer_options().max_iterations,
            400
        );
    }
}
