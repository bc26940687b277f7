//! Octree - node arena with insertion, removal, split/merge and queries.

use std::collections::{HashMap, HashSet};

use glam::DVec3;
use smallvec::SmallVec;

use super::{NodeId, OctreeConfig, OctreeNode, SpatialObject};
use crate::geometry::{Aabb, Frustum};
use crate::types::EntityId;

/// Structural statistics of the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OctreeStats {
  pub node_count: usize,
  pub leaf_count: usize,
  pub object_count: usize,
  /// Deepest live node.
  pub max_depth: u32,
  /// Largest resident population of any leaf.
  pub max_leaf_population: usize,
  /// Root residents lying outside the root box.
  pub overflow_count: usize,
  /// Splits performed since construction.
  pub splits: u64,
  /// Collapses performed since construction.
  pub merges: u64,
}

/// Arena-backed adaptive octree.
pub struct Octree {
  config: OctreeConfig,
  nodes: Vec<Option<OctreeNode>>,
  free: Vec<NodeId>,
  root: NodeId,
  /// Entity to owning node. Mirrors `SpatialObject::node`.
  locator: HashMap<EntityId, NodeId>,
  /// Largest radius ever inserted; node boxes are inflated by it when pruning.
  max_radius: f64,
  /// Objects moved by `update_in_place` whose owner may no longer contain
  /// them. Box pruning cannot find these, so queries test them directly.
  displaced: HashSet<EntityId>,
  splits: u64,
  merges: u64,
}

impl Default for Octree {
  fn default() -> Self {
    Self::new(OctreeConfig::default())
  }
}

impl Octree {
  /// Create an empty tree whose root spans `config.bounds`.
  pub fn new(config: OctreeConfig) -> Self {
    let root = OctreeNode::new(config.bounds, 0, None);
    Self {
      config,
      nodes: vec![Some(root)],
      free: Vec::new(),
      root: NodeId(0),
      locator: HashMap::new(),
      max_radius: 0.0,
      displaced: HashSet::new(),
      splits: 0,
      merges: 0,
    }
  }

  pub fn config(&self) -> &OctreeConfig {
    &self.config
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  /// Root box.
  pub fn bounds(&self) -> &Aabb {
    &self.config.bounds
  }

  /// Number of indexed objects.
  pub fn len(&self) -> usize {
    self.locator.len()
  }

  pub fn is_empty(&self) -> bool {
    self.locator.is_empty()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.locator.contains_key(id)
  }

  pub fn max_radius(&self) -> f64 {
    self.max_radius
  }

  /// Objects moved in place and not yet re-inserted.
  pub fn displaced_count(&self) -> usize {
    self.displaced.len()
  }

  fn is_displaced(&self, object: &SpatialObject) -> bool {
    !self.displaced.is_empty() && self.displaced.contains(object.entity_id.as_str())
  }

  /// Live node for a handle, `None` for released slots.
  pub fn node(&self, id: NodeId) -> Option<&OctreeNode> {
    self.nodes.get(id.index()).and_then(Option::as_ref)
  }

  /// Node currently owning an entity.
  pub fn owner_of(&self, id: &str) -> Option<NodeId> {
    self.locator.get(id).copied()
  }

  pub fn get(&self, id: &str) -> Option<&SpatialObject> {
    let owner = *self.locator.get(id)?;
    self.node(owner)?.objects.get(id)
  }

  /// Mutable access for in-place edits. Moving an object through this handle
  /// does not relocate it; use [`Octree::relocate`] for that.
  pub fn get_mut(&mut self, id: &str) -> Option<&mut SpatialObject> {
    let owner = *self.locator.get(id)?;
    self
      .nodes
      .get_mut(owner.index())?
      .as_mut()?
      .objects
      .get_mut(id)
  }

  // ===========================================================================
  // Arena
  // ===========================================================================

  fn slot(&self, id: NodeId) -> &OctreeNode {
    match self.nodes.get(id.index()) {
      Some(Some(node)) => node,
      _ => panic!("octree node {id:?} used after release"),
    }
  }

  fn slot_mut(&mut self, id: NodeId) -> &mut OctreeNode {
    match self.nodes.get_mut(id.index()) {
      Some(Some(node)) => node,
      _ => panic!("octree node {id:?} used after release"),
    }
  }

  fn allocate(&mut self, node: OctreeNode) -> NodeId {
    if let Some(id) = self.free.pop() {
      self.nodes[id.index()] = Some(node);
      id
    } else {
      let id = NodeId(self.nodes.len() as u32);
      self.nodes.push(Some(node));
      id
    }
  }

  fn release(&mut self, id: NodeId) -> OctreeNode {
    match self.nodes.get_mut(id.index()).and_then(Option::take) {
      Some(node) => {
        self.free.push(id);
        node
      }
      None => panic!("octree node {id:?} released twice"),
    }
  }

  // ===========================================================================
  // Insertion / removal
  // ===========================================================================

  /// Insert an object, replacing any object with the same id.
  ///
  /// Positions must be finite; callers validate before reaching the tree.
  pub fn insert(&mut self, object: SpatialObject) {
    debug_assert!(
      object.position.is_finite(),
      "non-finite position for `{}` reached the octree",
      object.entity_id
    );
    if self.locator.contains_key(&object.entity_id) {
      self.remove(object.entity_id.as_str());
    }
    self.max_radius = self.max_radius.max(object.radius);
    let root = self.root;
    self.descend_and_store(root, object);
  }

  /// Route `object` down from `start`, counting it in every node it passes,
  /// store it in the node where routing stops and split that node if it
  /// overflowed.
  fn descend_and_store(&mut self, start: NodeId, mut object: SpatialObject) {
    let position = object.position;
    let mut current = start;
    loop {
      let node = self.slot_mut(current);
      node.population += 1;
      match node.children {
        Some(children) if node.bounds.contains_point(position) => {
          current = children[node.bounds.octant_of(position) as usize];
        }
        _ => break,
      }
    }

    object.node = Some(current);
    let key = object.entity_id.clone();
    self.locator.insert(key.clone(), current);
    if object.dirty {
      self.displaced.insert(key.clone());
    }

    let node = self.slot_mut(current);
    node.objects.insert(key, object);
    let (resident, depth, bounds, leaf) = (node.objects.len(), node.depth, node.bounds, node.is_leaf());

    if leaf && self.config.should_split(resident, depth, &bounds) {
      self.split_node(current);
    }
  }

  /// Remove an object by id.
  ///
  /// Afterwards the highest ancestor whose subtree population dropped to the
  /// merge threshold collapses back into a leaf.
  pub fn remove(&mut self, id: &str) -> Option<SpatialObject> {
    let owner = match self.locator.remove(id) {
      Some(owner) => owner,
      None => self.find_owner(id)?,
    };
    let removed = self.slot_mut(owner).objects.remove(id);
    debug_assert!(removed.is_some(), "locator and node disagree about `{id}`");
    let mut object = removed?;
    object.node = None;
    self.displaced.remove(id);

    let mut cursor = Some(owner);
    while let Some(node_id) = cursor {
      let node = self.slot_mut(node_id);
      node.population -= 1;
      cursor = node.parent;
    }

    self.merge_upwards(owner);
    Some(object)
  }

  fn merge_upwards(&mut self, from: NodeId) {
    let threshold = self.config.merge_threshold();
    let start = self.slot(from);
    let mut candidate = if start.is_leaf() { start.parent } else { Some(from) };
    let mut target = None;

    // Populations only grow toward the root, so the first failure ends the walk.
    while let Some(node_id) = candidate {
      let node = self.slot(node_id);
      if node.population > threshold {
        break;
      }
      target = Some(node_id);
      candidate = node.parent;
    }

    if let Some(node_id) = target {
      self.collapse(node_id);
    }
  }

  /// Move an object and reconcile its index location immediately.
  pub fn relocate(&mut self, id: &str, position: DVec3, radius: Option<f64>) -> bool {
    let Some(mut object) = self.remove(id) else {
      return false;
    };
    object.update_position(position, radius);
    object.dirty = false;
    self.insert(object);
    true
  }

  /// Re-insert an object at its current (possibly dirty) position.
  pub fn reseat(&mut self, id: &str) -> bool {
    let Some(mut object) = self.remove(id) else {
      return false;
    };
    object.dirty = false;
    self.insert(object);
    true
  }

  /// Move an object without touching its index location; marks it dirty.
  pub fn update_in_place(&mut self, id: &str, position: DVec3, radius: Option<f64>) -> bool {
    let Some(object) = self.get_mut(id) else {
      return false;
    };
    object.update_position(position, radius);
    let radius = object.radius;
    self.max_radius = self.max_radius.max(radius);
    self.displaced.insert(EntityId::from(id));
    true
  }

  // ===========================================================================
  // Split / merge
  // ===========================================================================

  /// Split a leaf if depth and size allow, regardless of its population.
  pub fn split(&mut self, id: NodeId) -> bool {
    let node = self.slot(id);
    if !node.is_leaf() || !self.config.can_split(node.depth, &node.bounds) {
      return false;
    }
    self.split_node(id)
  }

  /// Collapse a subtree into a leaf, regardless of its population.
  pub fn merge(&mut self, id: NodeId) -> bool {
    self.collapse(id)
  }

  /// Create 8 children by halving each axis and redistribute residents by
  /// re-insertion, which re-checks the split condition in each child.
  fn split_node(&mut self, id: NodeId) -> bool {
    let (bounds, depth) = {
      let node = self.slot(id);
      if !node.is_leaf() {
        return false;
      }
      (node.bounds, node.depth)
    };

    let children: [NodeId; 8] = std::array::from_fn(|octant| {
      self.allocate(OctreeNode::new(bounds.child(octant as u8), depth + 1, Some(id)))
    });

    let node = self.slot_mut(id);
    node.children = Some(children);
    let residents: Vec<SpatialObject> = node.objects.drain().map(|(_, object)| object).collect();
    node.population -= residents.len();
    self.splits += 1;

    for object in residents {
      self.descend_and_store(id, object);
    }
    true
  }

  /// Release every descendant of `id` and move their objects into it.
  fn collapse(&mut self, id: NodeId) -> bool {
    let Some(children) = self.slot(id).children else {
      return false;
    };

    let mut gathered = Vec::new();
    let mut stack: SmallVec<[NodeId; 16]> = SmallVec::from_slice(&children);
    while let Some(node_id) = stack.pop() {
      let node = self.release(node_id);
      if let Some(grandchildren) = node.children {
        stack.extend_from_slice(&grandchildren);
      }
      gathered.extend(node.objects.into_values());
    }

    for object in &mut gathered {
      object.node = Some(id);
      self.locator.insert(object.entity_id.clone(), id);
    }

    let node = self.slot_mut(id);
    node.children = None;
    node
      .objects
      .extend(gathered.into_iter().map(|object| (object.entity_id.clone(), object)));
    self.merges += 1;
    true
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  /// Objects whose bounding sphere touches the query sphere.
  pub fn query_sphere(&self, center: DVec3, radius: f64) -> Vec<EntityId> {
    self.collect_matching(
      |bounds| bounds.intersects_sphere(center, radius),
      |object| object.bounding_sphere().intersects_sphere(center, radius),
    )
  }

  /// Objects whose bounding sphere is at least partly inside the frustum.
  pub fn query_frustum(&self, frustum: &Frustum) -> Vec<EntityId> {
    self.collect_matching(
      |bounds| frustum.intersects_aabb(bounds),
      |object| frustum.intersects_sphere(object.position, object.radius),
    )
  }

  /// Depth-first descent pruning subtrees whose inflated box fails
  /// `node_test`. Root residents are always tested since they may lie outside
  /// the root box, and displaced objects are tested outside the descent.
  fn collect_matching(
    &self,
    node_test: impl Fn(&Aabb) -> bool,
    object_test: impl Fn(&SpatialObject) -> bool,
  ) -> Vec<EntityId> {
    let mut results = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![self.root];

    while let Some(node_id) = stack.pop() {
      if !visited.insert(node_id) {
        continue;
      }
      let node = self.slot(node_id);
      let reachable = node_test(&node.bounds.expand(self.max_radius));
      if !reachable && node_id != self.root {
        continue;
      }

      results.extend(
        node
          .objects
          .values()
          .filter(|object| !self.is_displaced(object) && object_test(object))
          .map(|object| object.entity_id.clone()),
      );

      if reachable {
        if let Some(children) = node.children {
          stack.extend_from_slice(&children);
        }
      }
    }

    results.extend(
      self
        .displaced
        .iter()
        .filter_map(|id| self.get(id.as_str()))
        .filter(|object| object_test(object))
        .map(|object| object.entity_id.clone()),
    );
    results
  }

  /// Closest object to `point` within `max_distance`, measured to the
  /// bounding-sphere surface. Equal distances resolve to the smaller id.
  pub fn find_nearest(&self, point: DVec3, max_distance: f64) -> Option<(EntityId, f64)> {
    let mut best: Option<(&SpatialObject, f64)> = None;
    for object in self.displaced.iter().filter_map(|id| self.get(id.as_str())) {
      consider_nearest(object, point, max_distance, &mut best);
    }
    let mut visited = HashSet::new();
    self.nearest_in(self.root, point, max_distance, &mut best, &mut visited);
    best.map(|(object, distance)| (object.entity_id.clone(), distance))
  }

  fn nearest_in<'a>(
    &'a self,
    node_id: NodeId,
    point: DVec3,
    max_distance: f64,
    best: &mut Option<(&'a SpatialObject, f64)>,
    visited: &mut HashSet<NodeId>,
  ) {
    if !visited.insert(node_id) {
      return;
    }
    let node = self.slot(node_id);

    for object in node.objects.values() {
      if !self.is_displaced(object) {
        consider_nearest(object, point, max_distance, best);
      }
    }

    let Some(children) = node.children else {
      return;
    };

    let mut order: SmallVec<[(NodeId, f64); 8]> = children
      .iter()
      .map(|&child| {
        let bounds = self.slot(child).bounds.expand(self.max_radius);
        (child, bounds.distance_to_point(point))
      })
      .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    for (child, box_distance) in order {
      let bound = best.as_ref().map_or(max_distance, |(_, distance)| *distance);
      if box_distance > bound {
        break;
      }
      self.nearest_in(child, point, max_distance, best, visited);
    }
  }

  /// Depth-first search for the node holding `id`, ignoring the locator.
  pub fn find_owner(&self, id: &str) -> Option<NodeId> {
    let mut stack = vec![self.root];
    while let Some(node_id) = stack.pop() {
      let node = self.slot(node_id);
      if node.objects.contains_key(id) {
        return Some(node_id);
      }
      if let Some(children) = node.children {
        stack.extend_from_slice(&children);
      }
    }
    None
  }

  // ===========================================================================
  // Inspection / maintenance
  // ===========================================================================

  /// Live nodes with their handles.
  pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &OctreeNode)> {
    self
      .nodes
      .iter()
      .enumerate()
      .filter_map(|(index, slot)| slot.as_ref().map(|node| (NodeId(index as u32), node)))
  }

  /// Every indexed object.
  pub fn iter_objects(&self) -> impl Iterator<Item = &SpatialObject> {
    self.iter_nodes().flat_map(|(_, node)| node.objects.values())
  }

  /// Depth of the deepest live node.
  pub fn depth(&self) -> u32 {
    self.iter_nodes().map(|(_, node)| node.depth).max().unwrap_or(0)
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len() - self.free.len()
  }

  pub fn leaf_count(&self) -> usize {
    self.iter_nodes().filter(|(_, node)| node.is_leaf()).count()
  }

  /// Alias of [`Octree::len`].
  pub fn object_count(&self) -> usize {
    self.len()
  }

  /// Largest resident population of any leaf.
  pub fn max_leaf_population(&self) -> usize {
    self
      .iter_nodes()
      .filter(|(_, node)| node.is_leaf())
      .map(|(_, node)| node.object_count())
      .max()
      .unwrap_or(0)
  }

  pub fn stats(&self) -> OctreeStats {
    let mut stats = OctreeStats {
      object_count: self.len(),
      splits: self.splits,
      merges: self.merges,
      ..Default::default()
    };
    for (id, node) in self.iter_nodes() {
      stats.node_count += 1;
      stats.max_depth = stats.max_depth.max(node.depth);
      if node.is_leaf() {
        stats.leaf_count += 1;
        stats.max_leaf_population = stats.max_leaf_population.max(node.objects.len());
      }
      if id == self.root {
        stats.overflow_count = node
          .objects
          .values()
          .filter(|object| !self.config.bounds.contains_point(object.position))
          .count();
      }
    }
    stats
  }

  /// Take every object out and reset to a single empty root.
  pub fn drain(&mut self) -> Vec<SpatialObject> {
    let objects: Vec<SpatialObject> = self
      .nodes
      .drain(..)
      .flatten()
      .flat_map(|node| node.objects.into_values())
      .collect();
    self.clear();
    objects
  }

  /// Drop every object and node, keeping the configured bounds.
  pub fn clear(&mut self) {
    self.nodes.clear();
    self.nodes.push(Some(OctreeNode::new(self.config.bounds, 0, None)));
    self.free.clear();
    self.root = NodeId(0);
    self.locator.clear();
    self.displaced.clear();
    self.max_radius = 0.0;
  }

  /// Rebuild from scratch with identical bounds, re-inserting every object at
  /// its current position (which clears `dirty`). Returns the number of
  /// objects re-inserted.
  pub fn rebuild(&mut self) -> usize {
    let objects = self.drain();
    let count = objects.len();
    for mut object in objects {
      object.dirty = false;
      self.insert(object);
    }
    count
  }
}

fn consider_nearest<'a>(
  object: &'a SpatialObject,
  point: DVec3,
  max_distance: f64,
  best: &mut Option<(&'a SpatialObject, f64)>,
) {
  let distance = object.surface_distance(point);
  if distance > max_distance {
    return;
  }
  let better = match *best {
    None => true,
    Some((current, best_distance)) => {
      distance < best_distance || (distance == best_distance && object.entity_id < current.entity_id)
    }
  };
  if better {
    *best = Some((object, distance));
  }
}

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;
