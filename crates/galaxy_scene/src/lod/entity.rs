//! Entity types and their presets.
//!
//! The set of entity types is closed. Each type maps to a row of
//! [`PRESETS`]; adding a type means adding a variant and a row.

use std::fmt;

/// Kind of content entity in the galaxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
  Star,
  Planet,
  Moon,
  Asteroid,
  Station,
  Gateway,
  Nebula,
  Debris,
}

/// Base primitive used to build an entity's geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryKind {
  /// UV sphere; detail is the segment count.
  Sphere,
  /// Subdivided icosahedron; detail is the subdivision count.
  Icosahedron,
  /// Torus; detail is the tubular segment count.
  Torus,
  /// Particle cloud; detail is the particle count.
  Points,
  /// Box; detail is ignored.
  Cuboid,
}

/// Static description of an entity type.
#[derive(Clone, Copy, Debug)]
pub struct EntityPreset {
  pub name: &'static str,
  pub geometry: GeometryKind,
  /// Default visual priority in `[0, 1]`.
  pub importance: f64,
  /// Geometry detail at level 0 before quality scaling.
  pub base_detail: u32,
  /// Geometry detail for a level given the base detail.
  pub detail_at: fn(base: u32, level: usize) -> u32,
}

fn halve_per_level(base: u32, level: usize) -> u32 {
  base.checked_shr(level as u32).unwrap_or(0).max(4)
}

fn step_per_level(base: u32, level: usize) -> u32 {
  base.saturating_sub(level as u32)
}

fn quarter_per_level(base: u32, level: usize) -> u32 {
  base.checked_shr(2 * level as u32).unwrap_or(0).max(16)
}

fn constant(base: u32, _level: usize) -> u32 {
  base
}

/// Preset table indexed by `EntityType as usize`.
pub static PRESETS: [EntityPreset; 8] = [
  EntityPreset { name: "star", geometry: GeometryKind::Sphere, importance: 1.0, base_detail: 64, detail_at: halve_per_level },
  EntityPreset { name: "planet", geometry: GeometryKind::Sphere, importance: 0.8, base_detail: 48, detail_at: halve_per_level },
  EntityPreset { name: "moon", geometry: GeometryKind::Sphere, importance: 0.6, base_detail: 32, detail_at: halve_per_level },
  EntityPreset { name: "asteroid", geometry: GeometryKind::Icosahedron, importance: 0.3, base_detail: 3, detail_at: step_per_level },
  EntityPreset { name: "station", geometry: GeometryKind::Torus, importance: 0.7, base_detail: 32, detail_at: halve_per_level },
  EntityPreset { name: "gateway", geometry: GeometryKind::Torus, importance: 1.0, base_detail: 48, detail_at: halve_per_level },
  EntityPreset { name: "nebula", geometry: GeometryKind::Points, importance: 0.4, base_detail: 4096, detail_at: quarter_per_level },
  EntityPreset { name: "debris", geometry: GeometryKind::Cuboid, importance: 0.1, base_detail: 1, detail_at: constant },
];

impl EntityType {
  pub const ALL: [EntityType; 8] = [
    EntityType::Star,
    EntityType::Planet,
    EntityType::Moon,
    EntityType::Asteroid,
    EntityType::Station,
    EntityType::Gateway,
    EntityType::Nebula,
    EntityType::Debris,
  ];

  #[inline]
  pub fn preset(self) -> &'static EntityPreset {
    &PRESETS[self as usize]
  }

  pub fn name(self) -> &'static str {
    self.preset().name
  }

  pub fn geometry_kind(self) -> GeometryKind {
    self.preset().geometry
  }

  pub fn default_importance(self) -> f64 {
    self.preset().importance
  }

  /// Unscaled geometry detail at `level`.
  pub fn detail_at(self, level: usize) -> u32 {
    let preset = self.preset();
    (preset.detail_at)(preset.base_detail, level)
  }

  /// Parse a lowercase type name.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|ty| ty.name() == name)
  }
}

impl fmt::Display for EntityType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
