//! OctreeConfig - world bounds and split/merge thresholds.

use glam::DVec3;

use crate::constants::{DEFAULT_WORLD_HALF_EXTENT, MAX_DEPTH, MAX_OBJECTS_PER_NODE, MIN_NODE_SIZE};
use crate::geometry::Aabb;

/// Configuration for octree subdivision.
#[derive(Clone, Debug, PartialEq)]
pub struct OctreeConfig {
  /// Root box. Rebuilds keep these bounds.
  pub bounds: Aabb,

  /// Leaf population above which a node splits.
  pub max_objects_per_node: usize,

  /// Deepest allowed node depth (root = 0).
  pub max_depth: u32,

  /// Smallest allowed child edge length.
  pub min_node_size: f64,
}

impl OctreeConfig {
  /// Origin-centered world with the crate-wide thresholds.
  pub const DEFAULT: Self = Self {
    bounds: Aabb {
      min: DVec3::splat(-DEFAULT_WORLD_HALF_EXTENT),
      max: DVec3::splat(DEFAULT_WORLD_HALF_EXTENT),
    },
    max_objects_per_node: MAX_OBJECTS_PER_NODE,
    max_depth: MAX_DEPTH,
    min_node_size: MIN_NODE_SIZE,
  };

  /// Default thresholds with custom world bounds.
  pub fn with_bounds(bounds: Aabb) -> Self {
    Self {
      bounds,
      ..Self::default()
    }
  }

  /// Subtree population at or below which children collapse back into a leaf.
  #[inline]
  pub fn merge_threshold(&self) -> usize {
    self.max_objects_per_node / 2
  }

  /// Whether a node at `depth` with `bounds` is allowed to split.
  #[inline]
  pub fn can_split(&self, depth: u32, bounds: &Aabb) -> bool {
    depth < self.max_depth && bounds.min_extent() > 2.0 * self.min_node_size
  }

  /// Whether a leaf holding `population` objects should split.
  #[inline]
  pub fn should_split(&self, population: usize, depth: u32, bounds: &Aabb) -> bool {
    population > self.max_objects_per_node && self.can_split(depth, bounds)
  }
}

impl Default for OctreeConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
