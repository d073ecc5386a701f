//! Small geometry helpers shared by the tree builder and stage two.

mod bbox;

pub use bbox::Aabb;
