//! Full pipeline: component tree, stage one, stage two.


use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use common::Buffer2;

use crate::classifier::Classifier;
use crate::config::DetectorConfig;
use crate::error::{ConfigError, Result};
use crate::region::Region;
use crate::stage_one::StageOneSelector;
use crate::stage_two::StageTwoSelector;

/// Result of region detection with diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionResult {
    /// Final regions ordered by `(level, id)`. Ids are local to the channel
    /// they were detected in.
    pub regions: Vec<Region>,
    pub diagnostics: DetectionDiagnostics,
}

/// Counts from each stage of the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionDiagnostics {
    /// Nodes in the component tree.
    pub tree_nodes: usize,
    pub stage_one_accepted: usize,
    pub stage_one_rejected: usize,
    pub stage_two_accepted: usize,
    pub stage_two_rejected: usize,
}

impl DetectionDiagnostics {
    fn merge(&mut self, other: &DetectionDiagnostics) {
        self.tree_nodes += other.tree_nodes;
        self.stage_one_accepted += other.stage_one_accepted;
        self.stage_one_rejected += other.stage_one_rejected;
        self.stage_two_accepted += other.stage_two_accepted;
        self.stage_two_rejected += other.stage_two_rejected;
    }
}

impl DetectionResult {
    /// Join per-channel results in order. Counts are summed.
    pub fn concat(results: impl IntoIterator<Item = DetectionResult>) -> DetectionResult {
        let mut joined = DetectionResult::default();
        for result in results {
            joined.diagnostics.merge(&result.diagnostics);
            joined.regions.extend(result.regions);
        }
        joined
    }
}

/// Both selection stages behind one call.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use erfilter::{DetectorConfig, RegionDetector, load_classifier};
///
/// let stage_one = Arc::new(load_classifier("stage_one.yaml")?);
/// let stage_two = Arc::new(load_classifier("stage_two.json")?);
/// let mut detector = RegionDetector::new(DetectorConfig::default(), stage_one, stage_two)?;
/// let result = detector.detect(&image)?;
/// ```
#[derive(Debug, Clone)]
pub struct RegionDetector {
    stage_one: StageOneSelector,
    stage_two: StageTwoSelector,
}

impl RegionDetector {
    pub fn new(
        config: DetectorConfig,
        stage_one: Arc<dyn Classifier>,
        stage_two: Arc<dyn Classifier>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            stage_one: StageOneSelector::new(config.stage_one, stage_one)?,
            stage_two: StageTwoSelector::new(config.stage_two, stage_two)?,
        })
    }

    pub fn config(&self) -> DetectorConfig {
        DetectorConfig {
            stage_one: *self.stage_one.config(),
            stage_two: *self.stage_two.config(),
        }
    }

    pub fn stage_one(&self) -> &StageOneSelector {
        &self.stage_one
    }

    pub fn stage_two(&self) -> &StageTwoSelector {
        &self.stage_two
    }

    /// Detect character candidates in a single channel.
    pub fn detect(&mut self, image: &Buffer2<u8>) -> Result<DetectionResult> {
        let tree = self.stage_one.build_tree(image)?;
        let mut diagnostics = DetectionDiagnostics {
            tree_nodes: tree.len(),
            ..Default::default()
        };

        let mut regions = self.stage_one.select(tree)?;
        diagnostics.stage_one_accepted = regions.len();
        diagnostics.stage_one_rejected = self.stage_one.num_rejected();

        self.stage_two.run(image, &mut regions)?;
        diagnostics.stage_two_accepted = regions.len();
        diagnostics.stage_two_rejected = self.stage_two.num_rejected();

        tracing::info!(
            width = image.width(),
            height = image.height(),
            nodes = diagnostics.tree_nodes,
            stage_one = diagnostics.stage_one_accepted,
            stage_two = diagnostics.stage_two_accepted,
            "Detected character candidates"
        );

        Ok(DetectionResult {
            regions,
            diagnostics,
        })
    }

    /// Detect every channel independently and in parallel. Results keep the
    /// channel order.
    pub fn detect_channels(&self, channels: &[Buffer2<u8>]) -> Result<Vec<DetectionResult>> {
        channels
            .par_iter()
            .map(|channel| self.clone().detect(channel))
            .collect()
    }
}
