//! Region scoring.
//!
//! The selectors only need [`Classifier::eval`]. Any `Fn(&Region) -> f64`
//! closure is a classifier; [`ClassifierModel`] provides two concrete model
//! families that can be loaded from YAML or JSON files.

mod boosted;
mod loader;
mod margin;


use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub use boosted::{BoostedTrees, DecisionTree, TreeNode};
pub use loader::load_classifier;
pub use margin::MarginModel;

use crate::error::ModelLoadError;
use crate::region::Region;

/// Estimates P(region is a character).
///
/// Implementations must be pure: the selectors may call `eval` from several
/// threads at once and in any order. Values outside `[0, 1]` are clamped and
/// NaN counts as 0.
pub trait Classifier: Send + Sync {
    fn eval(&self, region: &Region) -> f64;

    /// Feature set the classifier reads, when it declares one. Stage one
    /// refuses classifiers that need stage-two features.
    fn required_features(&self) -> Option<FeatureSet> {
        None
    }
}

impl<F> Classifier for F
where
    F: Fn(&Region) -> f64 + Send + Sync,
{
    #[inline]
    fn eval(&self, region: &Region) -> f64 {
        self(region)
    }
}

/// Clamp a raw score into `[0, 1]`, mapping NaN to 0.
#[inline]
pub(crate) fn sanitize_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

// ============================================================================
// Feature sets
// ============================================================================

/// Feature vector a model is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// `[aspect_ratio, compactness, num_holes, horizontal_crossings]`.
    StageOne,
    /// Stage-one features plus
    /// `[hole_area_ratio, convex_hull_ratio, num_inflexion_points]`.
    StageTwo,
}

impl FeatureSet {
    pub fn num_features(self) -> usize {
        match self {
            FeatureSet::StageOne => 4,
            FeatureSet::StageTwo => 7,
        }
    }

    /// Feature vector of `region`, `None` if stage-two features were never computed.
    pub fn extract(self, region: &Region) -> Option<SmallVec<[f32; 7]>> {
        match self {
            FeatureSet::StageOne => Some(SmallVec::from_slice(&region.stage_one_features())),
            FeatureSet::StageTwo => region
                .stage_two_features()
                .map(|f| SmallVec::from_slice(&f)),
        }
    }
}

// ============================================================================
// Models
// ============================================================================

/// A loadable classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    BoostedTrees(BoostedTrees),
    Margin(MarginModel),
}

impl ClassifierModel {
    pub fn features(&self) -> FeatureSet {
        match self {
            ClassifierModel::BoostedTrees(model) => model.features,
            ClassifierModel::Margin(model) => model.features,
        }
    }

    /// Structural checks that make evaluation total: indices in range,
    /// matching lengths, finite parameters.
    pub fn validate(&self) -> Result<(), ModelLoadError> {
        match self {
            ClassifierModel::BoostedTrees(model) => model.validate(),
            ClassifierModel::Margin(model) => model.validate(),
        }
    }
}

impl Classifier for ClassifierModel {
    fn eval(&self, region: &Region) -> f64 {
        match self {
            ClassifierModel::BoostedTrees(model) => model.eval(region),
            ClassifierModel::Margin(model) => model.eval(region),
        }
    }

    fn required_features(&self) -> Option<FeatureSet> {
        Some(self.features())
    }
}

/// Logistic function.
#[inline]
pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
