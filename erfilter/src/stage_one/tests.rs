use std::collections::HashSet;

use common::Buffer2;

use super::*;
use crate::classifier::load_classifier;
use crate::error::{Error, InputError};
use crate::math::Aabb;
use crate::region::RegionId;
use crate::test_utils::{blocky_image, random_image};

fn selector(config: StageOneConfig, classifier: impl Classifier + 'static) -> StageOneSelector {
    StageOneSelector::new(config, Arc::new(classifier)).unwrap()
}

/// Classifier with an arbitrary but deterministic response to the shape features.
fn shape_score(region: &Region) -> f64 {
    let [aspect, compactness, holes, crossings] = region.stage_one_features();
    ((aspect * 7.3 + compactness * 11.1 + holes * 0.37 + crossings * 0.19) as f64).fract()
}

/// Background 255; A (intensity 100) contains B (0) and C (50).
fn nested_image() -> Buffer2<u8> {
    let mut image = Buffer2::new_filled(24, 24, 255u8);
    image.fill_rect(2, 2, 17, 17, 100);
    image.fill_rect(4, 4, 9, 9, 0);
    image.fill_rect(12, 12, 15, 15, 50);
    image
}

fn nested_config(non_max_suppression: bool) -> StageOneConfig {
    StageOneConfig {
        threshold_delta: 1,
        min_area: 0.01,
        max_area: 0.5,
        min_probability: 0.5,
        min_probability_diff: 0.1,
        non_max_suppression,
    }
}

/// P(A) = 0.6, P(B) = 0.9, P(C) = 0.1, everything else 0.
fn nested_classifier(p_a: f64, p_b: f64) -> impl Classifier {
    move |r: &Region| match r.area() {
        256 => p_a,
        36 => p_b,
        16 => 0.1,
        _ => 0.0,
    }
}

fn ids(regions: &[Region]) -> Vec<RegionId> {
    regions.iter().map(|r| r.id()).collect()
}

#[test]
fn rejects_invalid_config() {
    let config = StageOneConfig {
        threshold_delta: 0,
        ..Default::default()
    };
    let err = StageOneSelector::new(config, Arc::new(shape_score)).unwrap_err();
    assert_eq!(err, ConfigError::ThresholdDelta(0));
}

#[test]
fn single_blob_is_selected() {
    let mut image = Buffer2::new_filled(32, 32, 200u8);
    image.fill_rect(10, 12, 17, 17, 0);
    let mut stage = selector(StageOneConfig::default(), |r: &Region| {
        if (8..=133).contains(&r.area()) { 1.0 } else { 0.0 }
    });

    let regions = stage.run(&image).unwrap();
    assert_eq!(regions.len(), 1);
    let blob = &regions[0];
    assert_eq!(blob.bbox(), Aabb::new(10, 17, 12, 17));
    assert_eq!(blob.area(), 48);
    assert_eq!(blob.status(), RegionStatus::Accepted);
    assert_eq!(blob.probability(), 1.0);
    assert_eq!(stage.num_rejected(), 1);
}

#[test]
fn suppression_keeps_the_most_probable_nested_region() {
    let image = nested_image();

    let mut with_nms = selector(nested_config(true), nested_classifier(0.6, 0.9));
    let kept = with_nms.run(&image).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].area(), 36);
    assert_eq!(with_nms.num_rejected(), 3);

    let mut without_nms = selector(nested_config(false), nested_classifier(0.6, 0.9));
    let kept = without_nms.run(&image).unwrap();
    let areas: Vec<u32> = kept.iter().map(|r| r.area()).collect();
    assert_eq!(areas, vec![36, 256]);
    assert_eq!(without_nms.num_rejected(), 2);
}

#[test]
fn suppression_ties_favour_the_inner_region() {
    let mut stage = selector(nested_config(true), nested_classifier(0.8, 0.8));
    let kept = stage.run(&nested_image()).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].area(), 36);
}

#[test]
fn outer_region_wins_when_more_probable() {
    let mut stage = selector(nested_config(true), nested_classifier(0.95, 0.7));
    let kept = stage.run(&nested_image()).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].area(), 256);
}

#[test]
fn chain_can_lose_every_node_to_a_sibling_branch() {
    // A contains B and C. B beats A, A beats C, so the chain A > C keeps nothing.
    let mut nodes = ComponentTreeBuilder::new(1)
        .unwrap()
        .build(&nested_image())
        .unwrap()
        .into_nodes();
    let classifier = |r: &Region| match r.area() {
        256 => 0.7,
        36 => 0.9,
        16 => 0.65,
        _ => 0.0,
    };
    score(&mut nodes, &classifier, false);
    let eligible: Vec<bool> = nodes
        .iter()
        .map(|r| matches!(r.area(), 256 | 36 | 16))
        .collect();
    assert_eq!(eligible.iter().filter(|&&e| e).count(), 3);

    let kept = suppress_non_maxima(&nodes, &eligible);
    let kept_areas: Vec<u32> = nodes
        .iter()
        .zip(&kept)
        .filter(|(_, keep)| **keep)
        .map(|(r, _)| r.area())
        .collect();
    assert_eq!(kept_areas, vec![36]);
}

#[test]
fn probability_difference_filters_flat_chains() {
    // B barely rises above its parent's valley.
    let mut config = nested_config(false);
    config.min_probability_diff = 0.5;
    let mut stage = selector(config, |r: &Region| match r.area() {
        256 => 0.55,
        36 => 0.6,
        _ => 0.3,
    });
    let kept = stage.run(&nested_image()).unwrap();
    assert!(kept.is_empty(), "kept {:?}", ids(&kept));
}

#[test]
fn area_lower_bound_is_inclusive() {
    // 64 x 64 image, min_area * A = 64 pixels.
    let mut image = Buffer2::new_filled(64, 64, 200u8);
    image.fill_rect(4, 4, 11, 11, 0); // 8 x 8 = 64
    image.fill_rect(30, 30, 38, 36, 0); // 9 x 7 = 63
    let config = StageOneConfig {
        min_area: 0.015625,
        max_area: 0.5,
        ..Default::default()
    };
    let mut stage = selector(config, |r: &Region| {
        if r.area() == 63 || r.area() == 64 { 1.0 } else { 0.0 }
    });

    let kept = stage.run(&image).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].area(), 64);
    assert_eq!(kept[0].bbox(), Aabb::new(4, 11, 4, 11));
}

#[test]
fn area_upper_bound_is_exclusive() {
    let mut image = Buffer2::new_filled(16, 16, 200u8);
    image.fill_rect(0, 0, 7, 7, 0); // exactly a quarter
    let config = StageOneConfig {
        min_area: 0.01,
        max_area: 0.25,
        ..Default::default()
    };
    let mut stage = selector(config, |r: &Region| if r.area() == 64 { 1.0 } else { 0.0 });
    assert!(stage.run(&image).unwrap().is_empty());
}

#[test]
fn raising_min_probability_never_grows_the_result() {
    for non_max_suppression in [true, false] {
        let tree = ComponentTreeBuilder::new(1)
            .unwrap()
            .build(&blocky_image(48, 40, 2, 21))
            .unwrap();
        let mut previous: Option<HashSet<RegionId>> = None;
        for min_probability in [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
            let config = StageOneConfig {
                min_probability,
                min_probability_diff: 0.05,
                max_area: 0.9,
                non_max_suppression,
                ..Default::default()
            };
            let mut stage = selector(config, shape_score);
            let kept: HashSet<_> = ids(&stage.select(tree.clone()).unwrap()).into_iter().collect();
            if let Some(previous) = &previous {
                assert!(
                    kept.is_subset(previous),
                    "min_probability {min_probability} added regions (nms {non_max_suppression})"
                );
            }
            previous = Some(kept);
        }
    }
}

#[test]
fn runs_are_deterministic() {
    let image = random_image(40, 40, 5);
    let config = StageOneConfig {
        min_probability: 0.2,
        min_probability_diff: 0.05,
        ..Default::default()
    };
    let mut stage = selector(config, shape_score);
    let first = stage.run(&image).unwrap();
    let second = stage.run(&image).unwrap();
    assert!(!first.is_empty());
    assert_eq!(format!("{first:?}"), format!("{second:?}"));

    for pair in first.windows(2) {
        assert!((pair[0].level(), pair[0].id()) < (pair[1].level(), pair[1].id()));
    }
}

#[test]
fn every_node_is_accepted_or_rejected() {
    for (seed, nms) in [(1, true), (2, false), (3, true)] {
        let tree = ComponentTreeBuilder::new(1)
            .unwrap()
            .build(&blocky_image(30, 30, 3, seed))
            .unwrap();
        let total = tree.len();
        let config = StageOneConfig {
            min_probability: 0.3,
            min_probability_diff: 0.0,
            max_area: 1.0,
            non_max_suppression: nms,
            ..Default::default()
        };
        let mut stage = selector(config, shape_score);
        let kept = stage.select(tree).unwrap();
        assert_eq!(kept.len() + stage.num_rejected(), total);
        assert!(kept.iter().all(|r| r.status() == RegionStatus::Accepted));
    }
}

#[test]
fn suppressed_output_has_no_nested_pairs() {
    let tree = ComponentTreeBuilder::new(1)
        .unwrap()
        .build(&blocky_image(36, 36, 2, 8))
        .unwrap();
    let config = StageOneConfig {
        min_probability: 0.1,
        min_probability_diff: 0.0,
        max_area: 1.0,
        ..Default::default()
    };
    let mut stage = selector(config, shape_score);
    let kept = stage.select(tree.clone()).unwrap();
    let kept_ids: HashSet<_> = ids(&kept).into_iter().collect();
    for region in &kept {
        assert!(
            tree.ancestors(region.id()).all(|a| !kept_ids.contains(&a)),
            "{:?} kept together with an ancestor",
            region.id()
        );
    }
}

#[test]
fn scores_are_clamped_and_nan_is_zero() {
    let mut image = Buffer2::new_filled(16, 16, 200u8);
    image.fill_rect(2, 2, 5, 5, 0);

    let mut nan = selector(StageOneConfig::default(), |_: &Region| f64::NAN);
    assert!(nan.run(&image).unwrap().is_empty());

    let mut loud = selector(StageOneConfig::default(), |r: &Region| {
        if r.area() == 16 { 7.5 } else { -3.0 }
    });
    let kept = loud.run(&image).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].probability(), 1.0);
}

#[test]
fn parallel_scoring_matches_sequential() {
    let tree = ComponentTreeBuilder::new(1)
        .unwrap()
        .build(&random_image(32, 32, 77))
        .unwrap();
    let mut sequential = tree.clone().into_nodes();
    let mut parallel = tree.into_nodes();
    score(&mut sequential, &shape_score, false);
    score(&mut parallel, &shape_score, true);
    let a: Vec<u64> = sequential.iter().map(|r| r.probability().to_bits()).collect();
    let b: Vec<u64> = parallel.iter().map(|r| r.probability().to_bits()).collect();
    assert_eq!(a, b);
}

#[test]
fn tree_delta_must_match() {
    let image = random_image(10, 10, 1);
    let tree = ComponentTreeBuilder::new(2).unwrap().build(&image).unwrap();
    let mut stage = selector(StageOneConfig::default(), shape_score);
    let err = stage.select(tree).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::ThresholdDeltaMismatch {
            expected: 1,
            actual: 2
        })
    ));
}

#[test]
fn empty_image_is_an_input_error() {
    let mut stage = selector(StageOneConfig::default(), shape_score);
    let err = stage.run(&Buffer2::new(0, 0, Vec::new())).unwrap_err();
    assert!(matches!(err, Error::Input(InputError::EmptyImage { .. })));
}

#[test]
fn classifier_can_be_swapped() {
    let image = nested_image();
    let mut stage = selector(nested_config(true), |_: &Region| 0.0);
    assert!(stage.run(&image).unwrap().is_empty());
    stage.set_classifier(Arc::new(nested_classifier(0.6, 0.9))).unwrap();
    assert_eq!(stage.run(&image).unwrap().len(), 1);
    assert_eq!(stage.config().min_probability, 0.5);
}

#[test]
fn refuses_classifiers_that_need_stage_two_features() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../demos/models/stage_two.json");
    let stage_two_model: Arc<dyn Classifier> = Arc::new(load_classifier(&path).unwrap());
    let err =
        StageOneSelector::new(StageOneConfig::default(), stage_two_model.clone()).unwrap_err();
    assert_eq!(err, ConfigError::StageOneFeatures(FeatureSet::StageTwo));

    let mut stage = selector(StageOneConfig::default(), shape_score);
    assert_eq!(
        stage.set_classifier(stage_two_model).unwrap_err(),
        ConfigError::StageOneFeatures(FeatureSet::StageTwo)
    );

    let stage_one_model = load_classifier(path.with_file_name("stage_one.yaml")).unwrap();
    assert!(stage.set_classifier(Arc::new(stage_one_model)).is_ok());
}
