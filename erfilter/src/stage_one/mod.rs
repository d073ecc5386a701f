//! First selection stage: score every component tree node with the cheap
//! incrementally computed features and keep the local probability maxima.

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use common::Buffer2;

use crate::classifier::{Classifier, FeatureSet, sanitize_probability};
use crate::config::StageOneConfig;
use crate::error::{ConfigError, Result};
use crate::region::{Region, RegionStatus};
use crate::tree::{ComponentTree, ComponentTreeBuilder};

/// Node count above which scoring is spread over the rayon pool.
const PARALLEL_SCORING_THRESHOLD: usize = 4096;

#[derive(Clone)]
pub struct StageOneSelector {
    config: StageOneConfig,
    builder: ComponentTreeBuilder,
    classifier: Arc<dyn Classifier>,
    num_rejected: usize,
}

impl fmt::Debug for StageOneSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageOneSelector")
            .field("config", &self.config)
            .field("num_rejected", &self.num_rejected)
            .finish_non_exhaustive()
    }
}

impl StageOneSelector {
    pub fn new(config: StageOneConfig, classifier: Arc<dyn Classifier>) -> Result<Self, ConfigError> {
        config.validate()?;
        check_features(classifier.as_ref())?;
        Ok(Self {
            config,
            builder: ComponentTreeBuilder::new(config.threshold_delta)?,
            classifier,
            num_rejected: 0,
        })
    }

    pub fn config(&self) -> &StageOneConfig {
        &self.config
    }

    pub fn set_classifier(&mut self, classifier: Arc<dyn Classifier>) -> Result<(), ConfigError> {
        check_features(classifier.as_ref())?;
        self.classifier = classifier;
        Ok(())
    }

    /// Nodes rejected by the last [`select`](Self::select).
    pub fn num_rejected(&self) -> usize {
        self.num_rejected
    }

    /// Component tree of `image` with this selector's threshold step.
    pub fn build_tree(&self, image: &Buffer2<u8>) -> Result<ComponentTree> {
        self.builder.build(image)
    }

    /// Build the component tree of `image` and select from it.
    pub fn run(&mut self, image: &Buffer2<u8>) -> Result<Vec<Region>> {
        let tree = self.build_tree(image)?;
        self.select(tree)
    }

    /// Score and filter every node of `tree`.
    ///
    /// Returns the accepted regions ordered by `(level, id)`. Every other node
    /// ends up `Rejected` and is only reflected in [`num_rejected`](Self::num_rejected).
    pub fn select(&mut self, tree: ComponentTree) -> Result<Vec<Region>> {
        if tree.threshold_delta() != self.config.threshold_delta {
            return Err(ConfigError::ThresholdDeltaMismatch {
                expected: self.config.threshold_delta,
                actual: tree.threshold_delta(),
            }
            .into());
        }

        let image_area = tree.image_area() as f64;
        let mut nodes = tree.into_nodes();
        let parallel = nodes.len() >= PARALLEL_SCORING_THRESHOLD;
        score(&mut nodes, self.classifier.as_ref(), parallel);

        let eligible = self.eligible(&nodes, image_area);
        let kept = if self.config.non_max_suppression {
            suppress_non_maxima(&nodes, &eligible)
        } else {
            eligible
        };

        let mut accepted = Vec::new();
        let mut num_rejected = 0;
        for (mut node, keep) in nodes.into_iter().zip(kept) {
            if keep {
                node.set_status(RegionStatus::Accepted);
                accepted.push(node);
            } else {
                node.set_status(RegionStatus::Rejected);
                num_rejected += 1;
            }
        }
        accepted.sort_by_key(|r| (r.level, r.id));
        self.num_rejected = num_rejected;

        tracing::debug!(
            accepted = accepted.len(),
            rejected = num_rejected,
            non_max_suppression = self.config.non_max_suppression,
            "Stage one selection finished"
        );

        Ok(accepted)
    }

    /// Area range, local maximum, probability and probability-difference tests.
    fn eligible(&self, nodes: &[Region], image_area: f64) -> Vec<bool> {
        let config = &self.config;
        let min_area = config.min_area as f64 * image_area;
        let max_area = config.max_area as f64 * image_area;
        let min_probability = config.min_probability as f64;
        let min_diff = config.min_probability_diff as f64;

        let valleys = Valleys::compute(nodes);

        nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                let area = node.area as f64;
                let p = node.probability;
                area >= min_area
                    && area < max_area
                    && is_local_maximum(nodes, node)
                    && p >= min_probability
                    && p - valleys.deepest(i) >= min_diff
            })
            .collect()
    }
}

/// Stage-two features do not exist yet, so such a model would score every node 0.
fn check_features(classifier: &dyn Classifier) -> Result<(), ConfigError> {
    match classifier.required_features() {
        Some(FeatureSet::StageTwo) => Err(ConfigError::StageOneFeatures(FeatureSet::StageTwo)),
        _ => Ok(()),
    }
}

/// Store a sanitized classifier score on every node.
pub(crate) fn score(nodes: &mut [Region], classifier: &dyn Classifier, parallel: bool) {
    let apply = |node: &mut Region| {
        node.probability = sanitize_probability(classifier.eval(node));
        node.set_status(RegionStatus::Scored);
    };
    if parallel {
        nodes.par_iter_mut().for_each(apply);
    } else {
        nodes.iter_mut().for_each(apply);
    }
}

/// `p(parent) <= p(n)` and, when `n` has children, `p(child) <= p(n)` for at
/// least one of them.
fn is_local_maximum(nodes: &[Region], node: &Region) -> bool {
    let p = node.probability;
    let parent_ok = node.parent.is_none_or(|q| nodes[q.index()].probability <= p);
    let child_ok = node.children.is_empty()
        || node
            .children
            .iter()
            .any(|c| nodes[c.index()].probability <= p);
    parent_ok && child_ok
}

/// Lowest probabilities reachable from each node along non-increasing paths.
struct Valleys {
    up: Vec<f64>,
    down: Vec<f64>,
}

impl Valleys {
    fn compute(nodes: &[Region]) -> Self {
        let n = nodes.len();

        // Parents have larger ids, so a descending pass sees them first.
        let mut up = vec![0.0; n];
        for i in (0..n).rev() {
            let p = nodes[i].probability;
            up[i] = match nodes[i].parent {
                Some(q) if nodes[q.index()].probability <= p => up[q.index()],
                _ => p,
            };
        }

        let mut down = vec![0.0; n];
        for i in 0..n {
            let p = nodes[i].probability;
            down[i] = nodes[i]
                .children
                .iter()
                .filter(|c| nodes[c.index()].probability <= p)
                .map(|c| down[c.index()])
                .fold(p, f64::min);
        }

        Self { up, down }
    }

    #[inline]
    fn deepest(&self, i: usize) -> f64 {
        self.up[i].min(self.down[i])
    }
}

/// Keep an eligible node only if no eligible ancestor beats it and no
/// eligible descendant matches or beats it, so ties go to the innermost region.
///
/// A nested chain keeps at most one node. It can keep none: when the top of
/// the chain loses to a descendant in another branch, it still suppresses
/// the weaker nodes below it.
fn suppress_non_maxima(nodes: &[Region], eligible: &[bool]) -> Vec<bool> {
    let n = nodes.len();
    let candidate = |i: usize| {
        if eligible[i] {
            nodes[i].probability
        } else {
            f64::NEG_INFINITY
        }
    };

    let mut best_above = vec![f64::NEG_INFINITY; n];
    for i in (0..n).rev() {
        if let Some(q) = nodes[i].parent {
            let q = q.index();
            best_above[i] = best_above[q].max(candidate(q));
        }
    }

    let mut best_below = vec![f64::NEG_INFINITY; n];
    for i in 0..n {
        for c in &nodes[i].children {
            let c = c.index();
            best_below[i] = best_below[i].max(best_below[c]).max(candidate(c));
        }
    }

    (0..n)
        .map(|i| {
            let p = nodes[i].probability;
            eligible[i] && p >= best_above[i] && p > best_below[i]
        })
        .collect()
}
