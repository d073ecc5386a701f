//! Erfilter - Extremal region text candidate filtering.
//!
//! Finds regions of an 8-bit image that are likely to be text characters:
//! - Component tree of all extremal regions with incrementally computed descriptors
//! - Stage one: classifier scoring, local maxima and non-maximum suppression
//! - Stage two: hole, convex hull and inflexion features with a second classifier
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use erfilter::{DetectorConfig, RegionDetector, load_classifier, luma_from_dynamic};
//!
//! let image = luma_from_dynamic(&image::open("page.png")?.to_luma8().into())?;
//! let stage_one = Arc::new(load_classifier("stage_one.yaml")?);
//! let stage_two = Arc::new(load_classifier("stage_two.json")?);
//!
//! let mut detector = RegionDetector::new(DetectorConfig::default(), stage_one, stage_two)?;
//! let result = detector.detect(&image)?;
//!
//! println!("Found {} candidates", result.regions.len());
//! ```

pub mod classifier;
mod config;
mod convert;
mod detector;
mod error;
pub(crate) mod math;
mod region;
mod stage_one;
mod stage_two;
mod tree;

#[cfg(test)]
pub(crate) mod test_utils;

// ============================================================================
// Regions and trees
// ============================================================================

pub use math::Aabb;
pub use region::{Region, RegionId, RegionStatus, StageTwoFeatures};
pub use tree::{ComponentTree, ComponentTreeBuilder};

// ============================================================================
// Classification
// ============================================================================

pub use classifier::{Classifier, ClassifierModel, FeatureSet, load_classifier};

// ============================================================================
// Selection
// ============================================================================

pub use config::{DetectorConfig, StageOneConfig, StageTwoConfig};
pub use detector::{DetectionDiagnostics, DetectionResult, RegionDetector};
pub use stage_one::StageOneSelector;
pub use stage_two::StageTwoSelector;

// ============================================================================
// Images and errors
// ============================================================================

pub use convert::{from_gray_image, inverted, luma_from_dynamic, to_gray_image};
pub use error::{ConfigError, ConsistencyFault, Error, InputError, ModelLoadError, Result};
