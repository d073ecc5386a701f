//! Component tree of extremal regions.
//!
//! The tree is an arena: nodes are stored in creation order and refer to each
//! other through [`RegionId`]. A child always has a smaller id than its parent,
//! so iterating ids upwards is a valid bottom-up traversal and the root is the
//! last node.

mod builder;


pub use builder::ComponentTreeBuilder;
pub(crate) use builder::thresholds;

use crate::error::ConsistencyFault;
use crate::region::{Region, RegionId};

#[derive(Debug, Clone)]
pub struct ComponentTree {
    pub(crate) nodes: Vec<Region>,
    pub(crate) root: RegionId,
    pub(crate) threshold_delta: u32,
    pub(crate) width: usize,
    pub(crate) height: usize,
}

impl ComponentTree {
    pub fn nodes(&self) -> &[Region] {
        &self.nodes
    }

    #[inline]
    pub fn get(&self, id: RegionId) -> &Region {
        &self.nodes[id.index()]
    }

    /// Region covering the whole image at the last threshold.
    pub fn root(&self) -> RegionId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn threshold_delta(&self) -> u32 {
        self.threshold_delta
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel count of the source image.
    pub fn image_area(&self) -> usize {
        self.width * self.height
    }

    /// Parent chain of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: RegionId) -> impl Iterator<Item = RegionId> + '_ {
        std::iter::successors(self.get(id).parent, |&p| self.get(p).parent)
    }

    pub fn into_nodes(self) -> Vec<Region> {
        self.nodes
    }

    /// Check the structural invariants: a single root, parents created after
    /// their children, strict level and area nesting, and matching child links.
    pub fn verify(&self) -> Result<(), ConsistencyFault> {
        let roots = self.nodes.iter().filter(|n| n.parent.is_none()).count();
        match roots {
            0 => return Err(ConsistencyFault::MissingRoot),
            1 => {}
            n => return Err(ConsistencyFault::MultipleRoots(n)),
        }
        if self.get(self.root).parent.is_some() {
            return Err(ConsistencyFault::MissingRoot);
        }

        for node in &self.nodes {
            let Some(parent_id) = node.parent else {
                continue;
            };
            if parent_id <= node.id || parent_id.index() >= self.nodes.len() {
                return Err(ConsistencyFault::ParentOrder {
                    child: node.id,
                    parent: parent_id,
                });
            }
            let parent = self.get(parent_id);
            if parent.level <= node.level || parent.area <= node.area {
                return Err(ConsistencyFault::Nesting {
                    child: node.id,
                    parent: parent_id,
                    child_level: node.level,
                    parent_level: parent.level,
                    child_area: node.area,
                    parent_area: parent.area,
                });
            }
            if !parent.children.contains(&node.id) {
                return Err(ConsistencyFault::ChildLink {
                    child: node.id,
                    parent: parent_id,
                });
            }
        }
        Ok(())
    }
}
