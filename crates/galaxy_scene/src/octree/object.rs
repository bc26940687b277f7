//! SpatialObject - an indexed entity.

use glam::DVec3;
use web_time::Instant;

use super::NodeId;
use crate::geometry::BoundingSphere;
use crate::types::{EntityId, ObjectType, SpatialMetadata};

/// Entity record stored in exactly one octree node.
#[derive(Clone, Debug)]
pub struct SpatialObject {
  /// Stable external key.
  pub entity_id: EntityId,
  /// Authoritative position (may be ahead of the index while `dirty`).
  pub position: DVec3,
  /// Bounding radius, `>= 0`.
  pub radius: f64,
  pub object_type: ObjectType,
  /// Visual priority in `[0, 1]`.
  pub importance: f64,
  pub last_updated: Instant,
  /// Set when the position changed but the index location was not reconciled.
  pub dirty: bool,
  /// Owning node. Non-owning handle maintained by the octree.
  pub(crate) node: Option<NodeId>,
}

impl SpatialObject {
  pub fn new(
    entity_id: impl Into<EntityId>,
    position: DVec3,
    radius: f64,
    metadata: SpatialMetadata,
  ) -> Self {
    Self {
      entity_id: entity_id.into(),
      position,
      radius: radius.max(0.0),
      object_type: metadata.object_type,
      importance: metadata.importance.clamp(0.0, 1.0),
      last_updated: Instant::now(),
      dirty: false,
      node: None,
    }
  }

  /// Sphere derived from position and radius.
  #[inline]
  pub fn bounding_sphere(&self) -> BoundingSphere {
    BoundingSphere::new(self.position, self.radius)
  }

  /// Move the object, optionally resizing it, and mark it dirty.
  pub fn update_position(&mut self, position: DVec3, radius: Option<f64>) {
    self.position = position;
    if let Some(radius) = radius {
      self.radius = radius.max(0.0);
    }
    self.last_updated = Instant::now();
    self.dirty = true;
  }

  /// Center-to-point distance.
  #[inline]
  pub fn distance_to(&self, point: DVec3) -> f64 {
    self.position.distance(point)
  }

  /// Distance from `point` to the bounding-sphere surface (0 inside).
  #[inline]
  pub fn surface_distance(&self, point: DVec3) -> f64 {
    self.bounding_sphere().surface_distance(point)
  }

  /// Node currently holding this object.
  pub fn node(&self) -> Option<NodeId> {
    self.node
  }
}
