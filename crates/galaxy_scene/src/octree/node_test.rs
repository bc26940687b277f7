use glam::DVec3;

use super::*;

fn unit_node() -> OctreeNode {
  OctreeNode::new(Aabb::new(DVec3::ZERO, DVec3::splat(1.0)), 0, None)
}

/// A fresh node is an empty leaf.
#[test]
fn test_new_node_is_empty_leaf() {
  let node = unit_node();
  assert!(node.is_leaf());
  assert_eq!(node.object_count(), 0);
  assert_eq!(node.population(), 0);
  assert!(node.get_child(0).is_none());
}

/// Octant lookup masks to the low 3 bits.
#[test]
fn test_get_child_masks_octant() {
  let mut node = unit_node();
  let children: [NodeId; 8] = std::array::from_fn(|i| NodeId(i as u32 + 1));
  node.children = Some(children);

  assert!(!node.is_leaf());
  for octant in 0..8u8 {
    assert_eq!(node.get_child(octant), Some(NodeId(octant as u32 + 1)));
  }
  assert_eq!(node.get_child(9), Some(NodeId(2)));
}

#[test]
fn test_node_id_index() {
  assert_eq!(NodeId(42).index(), 42);
  assert!(NodeId(1) < NodeId(2));
}
