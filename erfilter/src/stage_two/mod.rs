//! Second selection stage: recover the pixel mask of every stage-one
//! survivor, add the expensive shape features and rescore.

mod features;


use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use common::Buffer2;

use crate::classifier::{Classifier, sanitize_probability};
use crate::config::StageTwoConfig;
use crate::error::{ConfigError, InputError, Result};
use crate::region::{Region, RegionStatus};

/// Region count above which feature extraction runs on the rayon pool.
const PARALLEL_FEATURES_THRESHOLD: usize = 64;

#[derive(Clone)]
pub struct StageTwoSelector {
    config: StageTwoConfig,
    classifier: Arc<dyn Classifier>,
    num_rejected: usize,
}

impl fmt::Debug for StageTwoSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageTwoSelector")
            .field("config", &self.config)
            .field("num_rejected", &self.num_rejected)
            .finish_non_exhaustive()
    }
}

impl StageTwoSelector {
    pub fn new(config: StageTwoConfig, classifier: Arc<dyn Classifier>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            classifier,
            num_rejected: 0,
        })
    }

    pub fn config(&self) -> &StageTwoConfig {
        &self.config
    }

    pub fn set_classifier(&mut self, classifier: Arc<dyn Classifier>) {
        self.classifier = classifier;
    }

    /// Regions dropped by the last [`run`](Self::run).
    pub fn num_rejected(&self) -> usize {
        self.num_rejected
    }

    /// Filter stage-one output in place.
    ///
    /// `regions` must all be `Accepted` and come from a tree of `image`.
    /// Survivors become `Accepted2` and keep their `(level, id)` order; the
    /// rest are removed.
    pub fn run(&mut self, image: &Buffer2<u8>, regions: &mut Vec<Region>) -> Result<()> {
        check_input(image, regions)?;

        let epsilon = self.config.contour_epsilon;
        let extract = |region: &mut Region| -> Result<()> {
            region.stage_two = Some(features::compute(image, region, epsilon)?);
            Ok(())
        };
        if regions.len() >= PARALLEL_FEATURES_THRESHOLD {
            regions.par_iter_mut().try_for_each(extract)?;
        } else {
            regions.iter_mut().try_for_each(extract)?;
        }

        let min_probability = self.config.min_probability as f64;
        let input = regions.len();
        for region in regions.iter_mut() {
            region.probability = sanitize_probability(self.classifier.eval(region));
            let next = if region.probability >= min_probability {
                RegionStatus::Accepted2
            } else {
                RegionStatus::Rejected2
            };
            region.set_status(next);
        }
        regions.retain(|r| r.status == RegionStatus::Accepted2);
        regions.sort_by_key(|r| (r.level, r.id));
        self.num_rejected = input - regions.len();

        tracing::debug!(
            input,
            accepted = regions.len(),
            rejected = self.num_rejected,
            "Stage two selection finished"
        );

        Ok(())
    }
}

fn check_input(image: &Buffer2<u8>, regions: &[Region]) -> Result<(), InputError> {
    let (width, height) = (image.width(), image.height());
    if image.is_empty() {
        return Err(InputError::EmptyImage { width, height });
    }
    for region in regions {
        if region.status != RegionStatus::Accepted {
            return Err(InputError::RegionNotAccepted {
                id: region.id,
                status: region.status,
            });
        }
        if region.bbox.x_max >= width || region.bbox.y_max >= height {
            return Err(InputError::RegionOutOfBounds {
                id: region.id,
                width,
                height,
            });
        }
    }
    Ok(())
}
