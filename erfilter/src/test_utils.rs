//! Synthetic images and brute-force reference descriptors for tests.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::Buffer2;

use crate::math::Aabb;
use crate::region::Region;

/// Image from rows of pixel values. All rows must have the same length.
pub(crate) fn image_from_rows(rows: &[&[u8]]) -> Buffer2<u8> {
    let width = rows[0].len();
    let pixels: Vec<u8> = rows.iter().flat_map(|row| row.iter().copied()).collect();
    Buffer2::new(width, rows.len(), pixels)
}

/// Uniform noise, deterministic for a given seed.
pub(crate) fn random_image(width: usize, height: usize, seed: u64) -> Buffer2<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    Buffer2::from_fn(width, height, |_, _| rng.random::<u8>())
}

/// Random `block x block` tiles drawn from a handful of intensities, which
/// produces larger regions with holes and merges than plain noise.
pub(crate) fn blocky_image(width: usize, height: usize, block: usize, seed: u64) -> Buffer2<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let bw = width.div_ceil(block);
    let bh = height.div_ceil(block);
    let tiles: Vec<u8> = (0..bw * bh)
        .map(|_| rng.random_range(0..6u8) * 50)
        .collect();
    Buffer2::from_fn(width, height, |x, y| tiles[(y / block) * bw + x / block])
}

/// 4-connected pixels with value `<= level` reachable from `seed`.
pub(crate) fn flood(image: &Buffer2<u8>, seed: (usize, usize), level: u8) -> Vec<(usize, usize)> {
    let (w, h) = (image.width(), image.height());
    let mut seen = vec![false; w * h];
    let mut out = Vec::new();
    let mut queue = VecDeque::new();
    if image[seed] <= level {
        seen[image.index(seed.0, seed.1)] = true;
        queue.push_back(seed);
    }
    while let Some((x, y)) = queue.pop_front() {
        out.push((x, y));
        let candidates = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in candidates {
            if nx < w && ny < h && !seen[ny * w + nx] && image[(nx, ny)] <= level {
                seen[ny * w + nx] = true;
                queue.push_back((nx, ny));
            }
        }
    }
    out
}

/// Descriptors computed directly from a pixel set.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reference {
    pub area: u32,
    pub bbox: Aabb,
    pub perimeter: u32,
    pub euler_number: i32,
    pub horizontal_crossings: f32,
}

pub(crate) fn reference_descriptors(pixels: &[(usize, usize)]) -> Reference {
    let mut bbox = Aabb::point(pixels[0].0, pixels[0].1);
    for &(x, y) in pixels {
        bbox.include(x, y);
    }

    // Mask padded by one pixel on every side.
    let pw = bbox.width() + 2;
    let ph = bbox.height() + 2;
    let mut mask = vec![false; pw * ph];
    for &(x, y) in pixels {
        mask[(y - bbox.y_min + 1) * pw + (x - bbox.x_min + 1)] = true;
    }

    let mut perimeter = 0;
    for &(x, y) in pixels {
        let (mx, my) = (x - bbox.x_min + 1, y - bbox.y_min + 1);
        for (nx, ny) in [(mx - 1, my), (mx + 1, my), (mx, my - 1), (mx, my + 1)] {
            if !mask[ny * pw + nx] {
                perimeter += 1;
            }
        }
    }

    // Background components under 8-connectivity; all but the outer one are holes.
    let mut label = vec![false; pw * ph];
    let mut background_components = 0;
    for start in 0..pw * ph {
        if mask[start] || label[start] {
            continue;
        }
        background_components += 1;
        label[start] = true;
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            let (x, y) = ((i % pw) as isize, (i / pw) as isize);
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= pw as isize || ny >= ph as isize {
                        continue;
                    }
                    let n = ny as usize * pw + nx as usize;
                    if !mask[n] && !label[n] {
                        label[n] = true;
                        stack.push(n);
                    }
                }
            }
        }
    }

    let crossings_at = |row: usize| {
        let my = row + 1;
        (1..pw)
            .filter(|&mx| mask[my * pw + mx] != mask[my * pw + mx - 1])
            .count() as u32
    };
    let h = bbox.height();
    let mut samples = [h / 6, 3 * h / 6, 5 * h / 6].map(crossings_at);
    samples.sort_unstable();

    Reference {
        area: pixels.len() as u32,
        bbox,
        perimeter,
        euler_number: 2 - background_components,
        horizontal_crossings: samples[1] as f32,
    }
}

/// Reference descriptors of a tree node, recomputed from the image.
pub(crate) fn reference_for(image: &Buffer2<u8>, region: &Region) -> Reference {
    reference_descriptors(&flood(image, region.seed(), region.level()))
}

pub(crate) fn descriptors_of(region: &Region) -> Reference {
    Reference {
        area: region.area(),
        bbox: region.bbox(),
        perimeter: region.perimeter(),
        euler_number: region.euler_number(),
        horizontal_crossings: region.horizontal_crossings(),
    }
}

/// Stand-alone region with a `width x height` box, not attached to any tree.
pub(crate) fn synthetic_region(width: usize, height: usize, area: u32, perimeter: u32) -> Region {
    use crate::region::{RegionId, RegionStatus};

    Region {
        id: RegionId(0),
        level: 0,
        area,
        bbox: Aabb::new(0, width - 1, 0, height - 1),
        perimeter,
        euler_number: 1,
        horizontal_crossings: 2.0,
        stage_two: None,
        probability: f64::NAN,
        parent: None,
        children: Default::default(),
        status: RegionStatus::Unvisited,
        seed: (0, 0),
    }
}
