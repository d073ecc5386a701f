//! Incremental component tree construction.
//!
//! Pixels are accumulated in increasing intensity order. At threshold `t` the
//! accumulated set holds every pixel with value `<= t`, and its 4-connected
//! components are exactly the extremal regions at that level. Components are
//! tracked with a union-find over pixel indices; every descriptor is updated
//! from the neighbourhood of the pixel being added, so no region is ever
//! rescanned.

use std::collections::VecDeque;

use smallvec::SmallVec;

use common::Buffer2;

use super::ComponentTree;
use crate::error::{ConfigError, ConsistencyFault, InputError, Result};
use crate::math::Aabb;
use crate::region::{Region, RegionId, RegionStatus};

// ============================================================================
// Constants
// ============================================================================

/// Sentinel for pixels that are not yet part of the accumulated set.
const NO_PIXEL: u32 = u32::MAX;

/// Number of distinct 8-bit intensities.
const NUM_LEVELS: usize = 256;

// ============================================================================
// Thresholds
// ============================================================================

/// Threshold sweep `0, delta, 2*delta, ...` clamped to 255, which is always
/// the last level.
pub(crate) fn thresholds(delta: u32) -> impl Iterator<Item = u8> {
    debug_assert!(delta >= 1);
    std::iter::successors(Some(0u32), move |&t| {
        (t < 255).then(|| t.saturating_add(delta).min(255))
    })
    .map(|t| t as u8)
}

// ============================================================================
// Component state
// ============================================================================

/// Descriptor accumulator of one live component.
#[derive(Debug, Default)]
struct Component {
    area: u32,
    /// Kept signed while merging; never negative once a pixel is added.
    perimeter: i64,
    euler: i32,
    bbox: Aabb,
    /// Horizontal runs per row, index 0 is `bbox.y_min`.
    row_runs: VecDeque<u32>,
    seed: u32,
    /// Node emitted for this component at the last level it changed.
    open_node: Option<RegionId>,
    /// Open nodes of components absorbed since `open_node` was emitted.
    pending_children: SmallVec<[RegionId; 4]>,
    touched: bool,
    alive: bool,
}

impl Component {
    fn singleton(x: usize, y: usize, pixel: u32) -> Self {
        let mut row_runs = VecDeque::with_capacity(1);
        row_runs.push_back(1);
        Self {
            area: 1,
            perimeter: 4,
            euler: 1,
            bbox: Aabb::point(x, y),
            row_runs,
            seed: pixel,
            open_node: None,
            pending_children: SmallVec::new(),
            touched: true,
            alive: true,
        }
    }

    /// Grow the row table so it spans `[y_min, y_max]`, then widen the box.
    fn cover(&mut self, bbox: &Aabb) {
        for _ in bbox.y_min..self.bbox.y_min {
            self.row_runs.push_front(0);
        }
        for _ in self.bbox.y_max..bbox.y_max {
            self.row_runs.push_back(0);
        }
        self.bbox = self.bbox.union(bbox);
    }

    /// Absorb `other`, leaving it dead.
    fn absorb(&mut self, other: &mut Component) {
        self.cover(&other.bbox);
        let offset = other.bbox.y_min - self.bbox.y_min;
        for (i, runs) in other.row_runs.drain(..).enumerate() {
            self.row_runs[offset + i] += runs;
        }
        other.row_runs = VecDeque::new();

        self.area += other.area;
        self.perimeter += other.perimeter;
        self.euler += other.euler;
        self.pending_children.extend(other.open_node.take());
        self.pending_children.extend(other.pending_children.drain(..));
        other.alive = false;
    }

    /// Median horizontal crossing count at 1/6, 3/6 and 5/6 of the box height.
    fn horizontal_crossings(&self) -> f32 {
        let h = self.row_runs.len();
        let mut samples = [h / 6, 3 * h / 6, 5 * h / 6].map(|row| 2 * self.row_runs[row]);
        samples.sort_unstable();
        samples[1] as f32
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds the extremal region component tree of an 8-bit image.
#[derive(Debug, Clone, Copy)]
pub struct ComponentTreeBuilder {
    threshold_delta: u32,
}

impl ComponentTreeBuilder {
    pub fn new(threshold_delta: u32) -> Result<Self, ConfigError> {
        if threshold_delta < 1 {
            return Err(ConfigError::ThresholdDelta(threshold_delta));
        }
        Ok(Self { threshold_delta })
    }

    pub fn threshold_delta(&self) -> u32 {
        self.threshold_delta
    }

    /// Sweep all thresholds over `image` and return the finished tree.
    ///
    /// Node ids follow creation order, so every parent has a larger id than
    /// its children and the root is the last node.
    pub fn build(&self, image: &Buffer2<u8>) -> Result<ComponentTree> {
        let (width, height) = (image.width(), image.height());
        if image.is_empty() {
            return Err(InputError::EmptyImage { width, height }.into());
        }
        let max = (NO_PIXEL - 1) as usize;
        if image.len() > max {
            return Err(InputError::ImageTooLarge {
                pixels: image.len(),
                max,
            }
            .into());
        }

        let mut state = SweepState::new(width, height);
        let order = sort_by_intensity(image.pixels());
        let mut next = 0usize;

        for level in thresholds(self.threshold_delta) {
            while next < order.len() && image[order[next] as usize] <= level {
                state.add_pixel(order[next]);
                next += 1;
            }
            state.emit_nodes(level);
        }
        debug_assert_eq!(next, order.len());

        let root = state.root()?;
        let tree = ComponentTree {
            nodes: state.nodes,
            root,
            threshold_delta: self.threshold_delta,
            width,
            height,
        };

        tracing::debug!(
            width,
            height,
            threshold_delta = self.threshold_delta,
            nodes = tree.len(),
            "Component tree built"
        );

        Ok(tree)
    }
}

/// Pixel indices ordered by intensity, raster order within equal values.
fn sort_by_intensity(pixels: &[u8]) -> Vec<u32> {
    let mut starts = [0usize; NUM_LEVELS + 1];
    for &v in pixels {
        starts[v as usize + 1] += 1;
    }
    for i in 0..NUM_LEVELS {
        starts[i + 1] += starts[i];
    }

    let mut order = vec![0u32; pixels.len()];
    for (idx, &v) in pixels.iter().enumerate() {
        let slot = &mut starts[v as usize];
        order[*slot] = idx as u32;
        *slot += 1;
    }
    order
}

// ============================================================================
// Sweep state
// ============================================================================

struct SweepState {
    width: usize,
    height: usize,
    /// Union-find parent per pixel, `NO_PIXEL` while the pixel is absent.
    uf_parent: Vec<u32>,
    /// Union-find size, only meaningful at roots.
    uf_size: Vec<u32>,
    /// Component slot of every union-find root.
    slot_of_root: Vec<u32>,
    components: Vec<Component>,
    /// Slots absorbed during the current level. They become reusable once
    /// the level's nodes are emitted.
    dead: Vec<u32>,
    /// Slots free for new components.
    free: Vec<u32>,
    /// Slots touched since the last emitted level, in order of first touch.
    touched: Vec<u32>,
    live: usize,
    nodes: Vec<Region>,
}

impl SweepState {
    fn new(width: usize, height: usize) -> Self {
        let n = width * height;
        Self {
            width,
            height,
            uf_parent: vec![NO_PIXEL; n],
            uf_size: vec![0; n],
            slot_of_root: vec![0; n],
            components: Vec::new(),
            dead: Vec::new(),
            free: Vec::new(),
            touched: Vec::new(),
            live: 0,
            nodes: Vec::new(),
        }
    }

    #[inline]
    fn is_present(&self, x: usize, y: usize) -> bool {
        self.uf_parent[y * self.width + x] != NO_PIXEL
    }

    /// Root of `pixel` with path halving.
    fn find(&mut self, mut pixel: u32) -> u32 {
        loop {
            let parent = self.uf_parent[pixel as usize];
            if parent == pixel {
                return pixel;
            }
            let grandparent = self.uf_parent[parent as usize];
            self.uf_parent[pixel as usize] = grandparent;
            pixel = grandparent;
        }
    }

    /// Fully present 2x2 blocks containing `(x, y)`, which must be present.
    fn full_blocks(&self, x: usize, y: usize) -> i32 {
        let mut count = 0;
        for (dx, dy) in [(-1isize, -1isize), (0, -1), (-1, 0), (0, 0)] {
            let (Some(bx), Some(by)) = (x.checked_add_signed(dx), y.checked_add_signed(dy)) else {
                continue;
            };
            if bx + 1 >= self.width || by + 1 >= self.height {
                continue;
            }
            if self.is_present(bx, by)
                && self.is_present(bx + 1, by)
                && self.is_present(bx, by + 1)
                && self.is_present(bx + 1, by + 1)
            {
                count += 1;
            }
        }
        count
    }

    fn add_pixel(&mut self, pixel: u32) {
        let idx = pixel as usize;
        let (x, y) = (idx % self.width, idx / self.width);
        self.uf_parent[idx] = pixel;
        self.uf_size[idx] = 1;

        let mut roots: SmallVec<[u32; 4]> = SmallVec::new();
        let mut n4 = 0i64;
        let mut horizontal = 0u32;
        let neighbours = [
            (x > 0).then(|| (idx - 1, true)),
            (x + 1 < self.width).then(|| (idx + 1, true)),
            (y > 0).then(|| (idx - self.width, false)),
            (y + 1 < self.height).then(|| (idx + self.width, false)),
        ];
        for (n, is_horizontal) in neighbours.into_iter().flatten() {
            if self.uf_parent[n] == NO_PIXEL {
                continue;
            }
            n4 += 1;
            if is_horizontal {
                horizontal += 1;
            }
            let root = self.find(n as u32);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        if roots.is_empty() {
            let component = Component::singleton(x, y, pixel);
            let slot = match self.free.pop() {
                Some(slot) => {
                    self.components[slot as usize] = component;
                    slot
                }
                None => {
                    self.components.push(component);
                    (self.components.len() - 1) as u32
                }
            };
            self.slot_of_root[idx] = slot;
            self.touched.push(slot);
            self.live += 1;
            return;
        }

        // Descriptor data lands in the slot with the tallest row table so
        // row merging copies the shorter one.
        let target_root = *roots
            .iter()
            .max_by_key(|&&r| {
                let slot = self.slot_of_root[r as usize] as usize;
                (self.components[slot].row_runs.len(), std::cmp::Reverse(r))
            })
            .unwrap_or(&roots[0]);
        let target = self.slot_of_root[target_root as usize] as usize;

        for &root in &roots {
            if root == target_root {
                continue;
            }
            let other = self.slot_of_root[root as usize] as usize;
            let mut absorbed = std::mem::take(&mut self.components[other]);
            self.components[target].absorb(&mut absorbed);
            self.components[other] = absorbed;
            self.dead.push(other as u32);
            self.live -= 1;
        }

        let f = self.full_blocks(x, y);
        let component = &mut self.components[target];
        component.cover(&Aabb::point(x, y));
        component.area += 1;
        component.perimeter += 4 - 2 * n4;
        component.euler += 1 - n4 as i32 + f;
        let row = &mut component.row_runs[y - component.bbox.y_min];
        *row = (*row + 1).saturating_sub(horizontal);
        if !component.touched {
            component.touched = true;
            self.touched.push(target as u32);
        }

        // Union by size over all merged roots plus the new pixel.
        let mut uf_root = target_root;
        for &root in &roots {
            if self.uf_size[root as usize] > self.uf_size[uf_root as usize] {
                uf_root = root;
            }
        }
        let mut size = 1;
        for &root in &roots {
            size += self.uf_size[root as usize];
            self.uf_parent[root as usize] = uf_root;
        }
        self.uf_parent[idx] = uf_root;
        self.uf_size[uf_root as usize] = size;
        self.slot_of_root[uf_root as usize] = target as u32;
    }

    /// Emit one node per component that changed since the previous level.
    fn emit_nodes(&mut self, level: u8) {
        let touched = std::mem::take(&mut self.touched);
        for &slot in &touched {
            let component = &mut self.components[slot as usize];
            if !component.alive {
                continue;
            }
            component.touched = false;

            let id = RegionId(self.nodes.len() as u32);
            let mut children: SmallVec<[RegionId; 4]> = SmallVec::new();
            children.extend(component.open_node.replace(id));
            children.extend(component.pending_children.drain(..));

            let seed = component.seed as usize;
            let region = Region {
                id,
                level,
                area: component.area,
                bbox: component.bbox,
                perimeter: component.perimeter as u32,
                euler_number: component.euler,
                horizontal_crossings: component.horizontal_crossings(),
                stage_two: None,
                probability: f64::NAN,
                parent: None,
                children,
                status: RegionStatus::Unvisited,
                seed: (seed % self.width, seed / self.width),
            };
            for child in &region.children {
                self.nodes[child.index()].parent = Some(id);
            }
            self.nodes.push(region);
        }
        self.touched = touched;
        self.touched.clear();
        self.free.append(&mut self.dead);
    }

    fn root(&self) -> Result<RegionId, ConsistencyFault> {
        match self.live {
            0 => Err(ConsistencyFault::MissingRoot),
            1 => self
                .components
                .iter()
                .find(|c| c.alive)
                .and_then(|c| c.open_node)
                .ok_or(ConsistencyFault::MissingRoot),
            n => Err(ConsistencyFault::MultipleRoots(n)),
        }
    }
}
