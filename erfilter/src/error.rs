//! Error types for the extremal region filter.

use std::path::PathBuf;

use thiserror::Error;

use crate::classifier::FeatureSet;
use crate::region::{RegionId, RegionStatus};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Any failure surfaced by the filter.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyFault),
}

/// Invalid parameter combination, raised before any image is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("threshold_delta must be >= 1, got {0}")]
    ThresholdDelta(u32),

    #[error("area range must satisfy 0 < min_area < max_area <= 1, got [{min_area}, {max_area}]")]
    AreaRange { min_area: f32, max_area: f32 },

    #[error("{name} must be within [0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f32 },

    #[error("contour_epsilon must be positive and finite, got {0}")]
    ContourEpsilon(f64),

    #[error("tree was built with threshold_delta {actual}, selector expects {expected}")]
    ThresholdDeltaMismatch { expected: u32, actual: u32 },

    #[error("stage one cannot use a classifier trained on {0:?} features")]
    StageOneFeatures(FeatureSet),
}

/// Malformed image or region input, raised at the start of a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("image has zero size ({width}x{height})")]
    EmptyImage { width: usize, height: usize },

    #[error("image has {pixels} pixels, at most {max} are supported")]
    ImageTooLarge { pixels: usize, max: usize },

    #[error("expected an 8-bit single-channel image, got {0}")]
    UnsupportedPixelFormat(String),

    #[error("region {id:?} has status {status:?}, expected Accepted")]
    RegionNotAccepted { id: RegionId, status: RegionStatus },

    #[error("region {id:?} lies outside the {width}x{height} image")]
    RegionOutOfBounds {
        id: RegionId,
        width: usize,
        height: usize,
    },

    #[error("region {id:?} does not match the image: {found} pixels at its seed, descriptor says {expected}")]
    RegionMismatch {
        id: RegionId,
        expected: u32,
        found: u32,
    },
}

/// Classifier model (or configuration file) could not be loaded.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Format(#[from] common::FileExtensionError),

    #[error("Failed to parse: {0}")]
    Parse(#[from] common::SerdeFormatError),

    #[error("Invalid model: {0}")]
    Invalid(String),
}

/// Broken component tree invariant. Always a defect in the builder, never bad input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyFault {
    #[error("component tree has no root")]
    MissingRoot,

    #[error("component tree ended with {0} roots")]
    MultipleRoots(usize),

    #[error("node {child:?} has parent {parent:?} created before it")]
    ParentOrder { child: RegionId, parent: RegionId },

    #[error("node {child:?} (level {child_level}, area {child_area}) is not nested in parent {parent:?} (level {parent_level}, area {parent_area})")]
    Nesting {
        child: RegionId,
        parent: RegionId,
        child_level: u8,
        parent_level: u8,
        child_area: u32,
        parent_area: u32,
    },

    #[error("node {child:?} is missing from the child list of {parent:?}")]
    ChildLink { child: RegionId, parent: RegionId },

    #[error("region {0:?} mask has no outer contour")]
    MissingContour(RegionId),
}
