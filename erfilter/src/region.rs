//! Extremal region descriptor stored in the component tree arena.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::math::Aabb;

/// Index of a region inside its component tree. Equal to creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub(crate) u32);

impl RegionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle of a region through the two selection stages.
///
/// `Unvisited -> Scored -> {Accepted | Rejected}`, then
/// `Accepted -> {Accepted2 | Rejected2}`. There are no transitions back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegionStatus {
    #[default]
    Unvisited,
    Scored,
    Accepted,
    Rejected,
    Accepted2,
    Rejected2,
}

impl RegionStatus {
    pub(crate) fn can_become(self, next: RegionStatus) -> bool {
        use RegionStatus::*;
        matches!(
            (self, next),
            (Unvisited, Scored)
                | (Scored, Accepted)
                | (Scored, Rejected)
                | (Accepted, Accepted2)
                | (Accepted, Rejected2)
        )
    }
}

/// Shape features only computed for stage-one survivors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTwoFeatures {
    /// Area of the holes divided by the region area.
    pub hole_area_ratio: f32,
    /// Region area divided by the area of its convex hull.
    pub convex_hull_ratio: f32,
    /// Turning direction changes along the simplified outer contour.
    pub num_inflexion_points: u32,
}

/// One extremal region: a connected set of pixels with intensity `<= level`.
#[derive(Debug, Clone, Serialize)]
pub struct Region {
    pub(crate) id: RegionId,
    pub(crate) level: u8,
    pub(crate) area: u32,
    pub(crate) bbox: Aabb,
    pub(crate) perimeter: u32,
    pub(crate) euler_number: i32,
    pub(crate) horizontal_crossings: f32,
    pub(crate) stage_two: Option<StageTwoFeatures>,
    pub(crate) probability: f64,
    /// Tree links only resolve inside the tree that produced them, so they
    /// are left out of serialized output.
    #[serde(skip)]
    pub(crate) parent: Option<RegionId>,
    #[serde(skip)]
    pub(crate) children: SmallVec<[RegionId; 4]>,
    pub(crate) status: RegionStatus,
    pub(crate) seed: (usize, usize),
}

impl Region {
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Threshold at which the region was formed.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Pixel count.
    pub fn area(&self) -> u32 {
        self.area
    }

    pub fn bbox(&self) -> Aabb {
        self.bbox
    }

    /// Number of pixel edges shared with the outside (4-neighbourhood).
    pub fn perimeter(&self) -> u32 {
        self.perimeter
    }

    /// Components minus holes. Always `1 - num_holes` for a single region.
    pub fn euler_number(&self) -> i32 {
        self.euler_number
    }

    pub fn num_holes(&self) -> i32 {
        1 - self.euler_number
    }

    /// Median of the horizontal crossing counts at 1/6, 3/6 and 5/6 of the height.
    pub fn horizontal_crossings(&self) -> f32 {
        self.horizontal_crossings
    }

    /// Bounding box width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.bbox.width() as f32 / self.bbox.height() as f32
    }

    /// `sqrt(area) / perimeter`.
    pub fn compactness(&self) -> f32 {
        (self.area as f32).sqrt() / self.perimeter as f32
    }

    pub fn stage_two(&self) -> Option<&StageTwoFeatures> {
        self.stage_two.as_ref()
    }

    pub fn hole_area_ratio(&self) -> Option<f32> {
        self.stage_two.map(|f| f.hole_area_ratio)
    }

    pub fn convex_hull_ratio(&self) -> Option<f32> {
        self.stage_two.map(|f| f.convex_hull_ratio)
    }

    pub fn num_inflexion_points(&self) -> Option<u32> {
        self.stage_two.map(|f| f.num_inflexion_points)
    }

    /// Last classifier score, `NaN` until scored.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn parent(&self) -> Option<RegionId> {
        self.parent
    }

    pub fn children(&self) -> &[RegionId] {
        &self.children
    }

    pub fn status(&self) -> RegionStatus {
        self.status
    }

    /// A pixel belonging to the region.
    pub fn seed(&self) -> (usize, usize) {
        self.seed
    }

    /// `[aspect_ratio, compactness, num_holes, horizontal_crossings]`.
    pub fn stage_one_features(&self) -> [f32; 4] {
        [
            self.aspect_ratio(),
            self.compactness(),
            self.num_holes() as f32,
            self.horizontal_crossings,
        ]
    }

    /// Stage-one features followed by
    /// `[hole_area_ratio, convex_hull_ratio, num_inflexion_points]`.
    pub fn stage_two_features(&self) -> Option<[f32; 7]> {
        let extra = self.stage_two?;
        let [aspect, compactness, holes, crossings] = self.stage_one_features();
        Some([
            aspect,
            compactness,
            holes,
            crossings,
            extra.hole_area_ratio,
            extra.convex_hull_ratio,
            extra.num_inflexion_points as f32,
        ])
    }

    pub(crate) fn set_status(&mut self, next: RegionStatus) {
        debug_assert!(
            self.status.can_become(next),
            "illegal status transition {:?} -> {:?} for {:?}",
            self.status,
            next,
            self.id
        );
        self.status = next;
    }
}
