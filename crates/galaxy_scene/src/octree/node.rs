//! OctreeNode - one cell of the arena-backed octree.

use std::collections::HashMap;

use super::SpatialObject;
use crate::geometry::Aabb;
use crate::types::EntityId;

/// Handle to a node slot in the octree arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
  /// Arena slot index.
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// Octree node.
///
/// `children` is `Some` iff the node is internal. Internal nodes normally hold
/// no objects; the root is the exception for positions outside its box.
#[derive(Debug)]
pub struct OctreeNode {
  pub(crate) bounds: Aabb,
  pub(crate) depth: u32,
  pub(crate) parent: Option<NodeId>,
  pub(crate) children: Option<[NodeId; 8]>,
  pub(crate) objects: HashMap<EntityId, SpatialObject>,
  /// Objects in this node and all descendants.
  pub(crate) population: usize,
}

impl OctreeNode {
  pub(crate) fn new(bounds: Aabb, depth: u32, parent: Option<NodeId>) -> Self {
    Self {
      bounds,
      depth,
      parent,
      children: None,
      objects: HashMap::new(),
      population: 0,
    }
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_none()
  }

  pub fn bounds(&self) -> &Aabb {
    &self.bounds
  }

  pub fn depth(&self) -> u32 {
    self.depth
  }

  pub fn parent(&self) -> Option<NodeId> {
    self.parent
  }

  pub fn children(&self) -> Option<&[NodeId; 8]> {
    self.children.as_ref()
  }

  /// Child handle for an octant (bits: X = 1, Y = 2, Z = 4).
  pub fn get_child(&self, octant: u8) -> Option<NodeId> {
    self.children.map(|children| children[(octant & 7) as usize])
  }

  /// Objects resident in this node only.
  pub fn object_count(&self) -> usize {
    self.objects.len()
  }

  /// Objects in this node's subtree.
  pub fn population(&self) -> usize {
    self.population
  }

  /// Resident objects of this node.
  pub fn objects(&self) -> impl Iterator<Item = &SpatialObject> {
    self.objects.values()
  }

  pub fn contains_object(&self, id: &str) -> bool {
    self.objects.contains_key(id)
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
