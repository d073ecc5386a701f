//! Shape features that need the full pixel mask of a region.

use std::collections::VecDeque;

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{approximate_polygon_dp, contour_area, convex_hull};
use imageproc::point::Point;
use imageproc::region_labelling::{Connectivity, connected_components};

use common::Buffer2;

use crate::error::{ConsistencyFault, InputError, Result};
use crate::region::{Region, StageTwoFeatures};

const FOREGROUND: u8 = 255;

/// Binary mask of one region inside its bounding box plus a one pixel margin.
#[derive(Debug)]
pub(crate) struct RegionMask {
    pub(crate) image: GrayImage,
    pub(crate) area: u32,
}

impl RegionMask {
    /// Flood fill from the seed over 4-connected pixels `<= level`, limited
    /// to the region's bounding box.
    /// A pixel count that differs from the descriptor means `region` was not
    /// built from `image`.
    pub(crate) fn extract(image: &Buffer2<u8>, region: &Region) -> Result<Self, InputError> {
        let bbox = region.bbox();
        let (x0, y0) = (bbox.x_min, bbox.y_min);
        let mut mask = GrayImage::new(bbox.width() as u32 + 2, bbox.height() as u32 + 2);
        let mut area = 0u32;

        let level = region.level();
        let seed = region.seed();
        let mut queue = VecDeque::new();
        if bbox.contains(seed.0, seed.1) && image[seed] <= level {
            mask.put_pixel((seed.0 - x0 + 1) as u32, (seed.1 - y0 + 1) as u32, Luma([FOREGROUND]));
            queue.push_back(seed);
        }

        while let Some((x, y)) = queue.pop_front() {
            area += 1;
            let neighbours = [
                x.checked_sub(1).map(|nx| (nx, y)),
                Some((x + 1, y)),
                y.checked_sub(1).map(|ny| (x, ny)),
                Some((x, y + 1)),
            ];
            for (nx, ny) in neighbours.into_iter().flatten() {
                if !bbox.contains(nx, ny) || image[(nx, ny)] > level {
                    continue;
                }
                let (mx, my) = ((nx - x0 + 1) as u32, (ny - y0 + 1) as u32);
                if mask.get_pixel(mx, my).0[0] == FOREGROUND {
                    continue;
                }
                mask.put_pixel(mx, my, Luma([FOREGROUND]));
                queue.push_back((nx, ny));
            }
        }

        if area != region.area() {
            return Err(InputError::RegionMismatch {
                id: region.id(),
                expected: region.area(),
                found: area,
            });
        }
        Ok(Self { image: mask, area })
    }

    /// Pixels enclosed by the region divided by its area.
    pub(crate) fn hole_area_ratio(&self) -> f32 {
        // Label everything that is not foreground; the margin guarantees the
        // corner belongs to the outside.
        let labels = connected_components(&self.image, Connectivity::Eight, Luma([FOREGROUND]));
        let outside = labels.get_pixel(0, 0).0[0];
        let holes = labels
            .pixels()
            .filter(|l| l.0[0] != 0 && l.0[0] != outside)
            .count();
        holes as f32 / self.area as f32
    }

    /// Outer boundary pixels in tracing order.
    pub(crate) fn outer_contour(&self) -> Option<Vec<Point<i32>>> {
        find_contours::<i32>(&self.image)
            .into_iter()
            .find(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| c.points)
    }
}

/// Region area over the area of the convex hull of its pixel squares.
pub(crate) fn convex_hull_ratio(contour: &[Point<i32>], area: u32) -> f32 {
    let corners: Vec<Point<i32>> = contour
        .iter()
        .flat_map(|p| {
            [
                Point::new(p.x, p.y),
                Point::new(p.x + 1, p.y),
                Point::new(p.x, p.y + 1),
                Point::new(p.x + 1, p.y + 1),
            ]
        })
        .collect();
    let hull_area = contour_area(&convex_hull(corners.as_slice())).abs();
    if hull_area > 0.0 {
        (area as f64 / hull_area) as f32
    } else {
        1.0
    }
}

/// Changes of turning direction along the closed contour after
/// Douglas-Peucker simplification with tolerance `epsilon`.
pub(crate) fn num_inflexion_points(contour: &[Point<i32>], epsilon: f64) -> u32 {
    if contour.len() < 3 {
        return 0;
    }
    let polygon = approximate_polygon_dp(contour, epsilon, true);
    let n = polygon.len();
    if n < 3 {
        return 0;
    }

    let turns: Vec<i64> = (0..n)
        .filter_map(|i| {
            let prev = polygon[(i + n - 1) % n];
            let curr = polygon[i];
            let next = polygon[(i + 1) % n];
            let (ax, ay) = ((curr.x - prev.x) as i64, (curr.y - prev.y) as i64);
            let (bx, by) = ((next.x - curr.x) as i64, (next.y - curr.y) as i64);
            let cross = ax * by - ay * bx;
            (cross != 0).then_some(cross.signum())
        })
        .collect();

    let m = turns.len();
    (0..m).filter(|&i| turns[i] != turns[(i + 1) % m]).count() as u32
}

/// All stage-two features of `region`.
pub(crate) fn compute(
    image: &Buffer2<u8>,
    region: &Region,
    contour_epsilon: f64,
) -> Result<StageTwoFeatures> {
    let mask = RegionMask::extract(image, region)?;
    let contour = mask
        .outer_contour()
        .ok_or(ConsistencyFault::MissingContour(region.id()))?;

    Ok(StageTwoFeatures {
        hole_area_ratio: mask.hole_area_ratio(),
        convex_hull_ratio: convex_hull_ratio(&contour, mask.area),
        num_inflexion_points: num_inflexion_points(&contour, contour_epsilon),
    })
}
