//! Configuration types for the two filter stages.
//!
//! Defaults match the parameters recommended for the Neumann & Matas
//! sequential classifier (CVPR 2012).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModelLoadError, Result};

// ============================================================================
// Stage one
// ============================================================================

/// Parameters of the coarse, incrementally computed filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOneConfig {
    /// Step between consecutive thresholds of the component tree sweep.
    pub threshold_delta: u32,
    /// Minimum region area as a fraction of the image area (inclusive).
    pub min_area: f32,
    /// Maximum region area as a fraction of the image area (exclusive).
    pub max_area: f32,
    /// Minimum P(er|character) for a region to be kept.
    pub min_probability: f32,
    /// Minimum difference between a local maximum and the surrounding minimum.
    pub min_probability_diff: f32,
    /// Keep only the most probable region of every nested chain.
    pub non_max_suppression: bool,
}

impl Default for StageOneConfig {
    fn default() -> Self {
        Self {
            threshold_delta: 1,
            min_area: 0.00025,
            max_area: 0.13,
            min_probability: 0.4,
            min_probability_diff: 0.1,
            non_max_suppression: true,
        }
    }
}

impl StageOneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold_delta < 1 {
            return Err(ConfigError::ThresholdDelta(self.threshold_delta));
        }
        // Negated comparisons so NaN fails as well.
        if !(self.min_area > 0.0 && self.min_area < self.max_area && self.max_area <= 1.0) {
            return Err(ConfigError::AreaRange {
                min_area: self.min_area,
                max_area: self.max_area,
            });
        }
        check_probability("min_probability", self.min_probability)?;
        check_probability("min_probability_diff", self.min_probability_diff)?;
        Ok(())
    }
}

// ============================================================================
// Stage two
// ============================================================================

/// Parameters of the refined filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageTwoConfig {
    /// Minimum P(er|character) for a stage-one survivor to be kept.
    pub min_probability: f32,
    /// Douglas-Peucker tolerance (pixels) applied to the outer contour before
    /// counting inflexion points.
    pub contour_epsilon: f64,
}

impl Default for StageTwoConfig {
    fn default() -> Self {
        Self {
            min_probability: 0.3,
            contour_epsilon: 1.0,
        }
    }
}

impl StageTwoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("min_probability", self.min_probability)?;
        if !(self.contour_epsilon > 0.0 && self.contour_epsilon.is_finite()) {
            return Err(ConfigError::ContourEpsilon(self.contour_epsilon));
        }
        Ok(())
    }
}

// ============================================================================
// Whole pipeline
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub stage_one: StageOneConfig,
    pub stage_two: StageTwoConfig,
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stage_one.validate()?;
        self.stage_two.validate()
    }

    /// Read a YAML or JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = common::FileFormat::from_path(path).map_err(ModelLoadError::from)?;
        let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DetectorConfig =
            common::deserialize(&text, format).map_err(ModelLoadError::from)?;
        config.validate()?;
        Ok(config)
    }
}

fn check_probability(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { name, value })
    }
}
