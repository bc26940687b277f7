//! Identifiers and classification types shared across the crate.

use std::borrow::Borrow;
use std::fmt;

/// Stable external key of an entity (a page slug or URL).
///
/// Lookups accept `&str` directly thanks to the `Borrow<str>` impl.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct EntityId(String);

impl EntityId {
  /// Create an id from anything string-like.
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// Borrow the raw key.
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for EntityId {
  fn from(id: &str) -> Self {
    Self(id.to_owned())
  }
}

impl From<String> for EntityId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

impl From<&EntityId> for EntityId {
  fn from(id: &EntityId) -> Self {
    id.clone()
  }
}

impl Borrow<str> for EntityId {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl AsRef<str> for EntityId {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for EntityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// How an entity moves, which decides how its index entry is maintained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ObjectType {
  /// Never moves after registration.
  #[default]
  Static,
  /// Moves occasionally; updates are batched.
  Dynamic,
  /// Moves every frame, few in number (camera-anchored objects).
  Frequent,
  /// Large, slow-moving background structures; reconciled on read.
  Massive,
}

/// Registration metadata passed to [`crate::SpatialPartitioner::add_entity`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpatialMetadata {
  /// Movement class of the entity.
  pub object_type: ObjectType,
  /// Visual priority in `[0, 1]`; clamped on registration.
  pub importance: f64,
}

impl SpatialMetadata {
  /// Metadata for a static entity with the given importance.
  pub fn fixed(importance: f64) -> Self {
    Self {
      object_type: ObjectType::Static,
      importance,
    }
  }

  /// Metadata for a moving entity.
  pub fn moving(object_type: ObjectType, importance: f64) -> Self {
    Self {
      object_type,
      importance,
    }
  }
}

impl Default for SpatialMetadata {
  fn default() -> Self {
    Self {
      object_type: ObjectType::Static,
      importance: 0.5,
    }
  }
}
