//! Error types for the partitioner and the LOD manager.
//!
//! Validation failures are returned to the caller. Octree structural faults
//! (touching a released node) are programming errors and assert instead.

use std::fmt;

use glam::DVec3;
use thiserror::Error;

use crate::types::EntityId;

/// Result type for spatial operations.
pub type SpatialResult<T> = Result<T, SpatialError>;

/// Result type for LOD operations.
pub type LodResult<T> = Result<T, LodError>;

/// Errors reported by [`crate::SpatialPartitioner`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpatialError {
  /// The id was never registered or has been removed.
  #[error("entity `{0}` is not registered")]
  UnknownEntity(EntityId),

  /// A position component is NaN or infinite.
  #[error("entity `{id}` has a non-finite position {position}")]
  InvalidPosition { id: EntityId, position: DVec3 },

  /// The bounding radius is negative or non-finite.
  #[error("entity `{id}` has an invalid radius {radius}")]
  InvalidRadius { id: EntityId, radius: f64 },

  /// Static entities are immutable after registration.
  #[error("entity `{0}` is static and cannot be moved")]
  StaticEntity(EntityId),
}

/// Which render resource a creation or capacity error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
  Geometry,
  Material,
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResourceKind::Geometry => f.write_str("geometry"),
      ResourceKind::Material => f.write_str("material"),
    }
  }
}

/// Errors reported by [`crate::LodManager`] and its caches.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LodError {
  /// The id has no LOD registration.
  #[error("entity `{0}` is not registered for LOD")]
  UnknownEntity(EntityId),

  /// The requested level does not exist for this entity.
  #[error("entity `{id}` has no LOD level {level} (available: {available})")]
  InvalidLevel {
    id: EntityId,
    level: usize,
    available: usize,
  },

  /// Base size must be finite and positive.
  #[error("entity `{id}` has an invalid base size {base_size}")]
  InvalidBaseSize { id: EntityId, base_size: f64 },

  /// A zero-capacity cache cannot hold any entry.
  #[error("{kind} cache cannot make room (capacity {capacity})")]
  Capacity { kind: ResourceKind, capacity: usize },

  /// The external factory failed to create a resource.
  #[error("failed to create {kind} `{key}`: {message}")]
  ResourceCreation {
    kind: ResourceKind,
    key: String,
    message: String,
  },
}
