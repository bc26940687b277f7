//! Adaptive octree for entity indexing.
//!
//! Nodes live in an arena owned by [`Octree`] and refer to each other through
//! [`NodeId`] handles, so ownership is one-directional: the arena owns nodes,
//! nodes own their resident [`SpatialObject`]s, and back-references (object to
//! node, node to parent) are plain indices.
//!
//! # Split / merge
//!
//! ```text
//! leaf population > max_objects_per_node
//!   && depth < max_depth
//!   && min_extent > 2 * min_node_size          => split into 8 octants
//!
//! subtree population <= max_objects_per_node / 2 => collapse into a leaf
//! ```
//!
//! Each object lives in exactly one node: the leaf whose box contains its
//! position. Positions outside the root box stay resident at the root.
//!
//! # Module Structure
//!
//! - [`config`]: `OctreeConfig` - world bounds and split/merge thresholds
//! - [`object`]: `SpatialObject` - indexed entity record
//! - [`node`]: `OctreeNode` - arena node
//! - [`tree`]: `Octree` - arena, insertion, removal and queries

pub mod config;
pub mod node;
pub mod object;
pub mod tree;

// Re-exports
pub use config::OctreeConfig;
pub use node::{NodeId, OctreeNode};
pub use object::SpatialObject;
pub use tree::{Octree, OctreeStats};
