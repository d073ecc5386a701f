//! Linear margin classifier with a Platt-scaled output.

use serde::{Deserialize, Serialize};

use super::{FeatureSet, sigmoid};
use crate::error::ModelLoadError;
use crate::region::Region;

/// `p = 1 / (1 + exp(-(scale * m + offset)))` with margin `m = w . x + bias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginModel {
    pub features: FeatureSet,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl MarginModel {
    pub fn margin(&self, x: &[f32]) -> f64 {
        self.weights
            .iter()
            .zip(x)
            .map(|(&w, &v)| w * v as f64)
            .sum::<f64>()
            + self.bias
    }

    pub fn eval(&self, region: &Region) -> f64 {
        let Some(x) = self.features.extract(region) else {
            return 0.0;
        };
        sigmoid(self.scale * self.margin(&x) + self.offset)
    }

    pub(crate) fn validate(&self) -> Result<(), ModelLoadError> {
        let expected = self.features.num_features();
        if self.weights.len() != expected {
            return Err(ModelLoadError::Invalid(format!(
                "margin model has {} weights, feature set needs {expected}",
                self.weights.len()
            )));
        }
        let params = [self.bias, self.scale, self.offset];
        if let Some(bad) = self.weights.iter().chain(&params).find(|v| !v.is_finite()) {
            return Err(ModelLoadError::Invalid(format!(
                "margin model has non-finite parameter {bad}"
            )));
        }
        Ok(())
    }
}
