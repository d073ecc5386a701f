//! Ensemble of real-valued decision trees (boosting style).

use serde::{Deserialize, Serialize};

use super::{FeatureSet, sigmoid};
use crate::error::ModelLoadError;
use crate::region::Region;

/// Sum of tree votes mapped to a probability with `1 / (1 + exp(-2 * votes))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    pub features: FeatureSet,
    pub trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Node 0 is the root. Split children always have larger indices.
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    /// Go `left` if `x[feature] < threshold`, otherwise `right`.
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

impl DecisionTree {
    fn vote(&self, x: &[f32]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[feature] < threshold { left } else { right },
                TreeNode::Leaf { value } => return value,
            }
        }
    }

    fn validate(&self, tree: usize, num_features: usize) -> Result<(), ModelLoadError> {
        let invalid = |msg: String| ModelLoadError::Invalid(format!("tree {tree}: {msg}"));
        if self.nodes.is_empty() {
            return Err(invalid("no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= num_features {
                        return Err(invalid(format!(
                            "node {i} uses feature {feature}, model has {num_features}"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(invalid(format!("node {i} has threshold {threshold}")));
                    }
                    for child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(invalid(format!(
                                "node {i} points to node {child}, expected ({i}, {})",
                                self.nodes.len()
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(invalid(format!("leaf {i} has value {value}")));
                    }
                }
            }
        }
        Ok(())
    }
}

impl BoostedTrees {
    pub fn eval(&self, region: &Region) -> f64 {
        let Some(x) = self.features.extract(region) else {
            return 0.0;
        };
        let votes: f64 = self.trees.iter().map(|tree| tree.vote(&x)).sum();
        sigmoid(2.0 * votes)
    }

    pub(crate) fn validate(&self) -> Result<(), ModelLoadError> {
        if self.trees.is_empty() {
            return Err(ModelLoadError::Invalid("boosted model has no trees".into()));
        }
        let num_features = self.features.num_features();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, num_features)?;
        }
        Ok(())
    }
}
