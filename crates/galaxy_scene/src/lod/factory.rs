//! Contracts with the renderer: resource creation and mesh mutation.

use std::fmt;
use std::rc::Rc;

use super::{Disposable, EntityType, GeometryKind};

/// Everything a factory needs to build one level's geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeometrySpec {
  pub entity_type: EntityType,
  pub kind: GeometryKind,
  pub lod_level: usize,
  /// Segment / subdivision / particle count, depending on `kind`.
  pub detail: u32,
  /// Built at unit size; the mesh is scaled to this afterwards.
  pub base_size: f64,
}

/// Everything a factory needs to build one level's material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialSpec {
  pub entity_type: EntityType,
  pub lod_level: usize,
  pub texture_size: u32,
}

/// Creates render resources on demand.
pub trait ResourceFactory {
  type Geometry: Disposable;
  type Material: Disposable;
  type Error: fmt::Display;

  fn create_geometry(&mut self, spec: &GeometrySpec) -> Result<Self::Geometry, Self::Error>;

  fn create_material(&mut self, spec: &MaterialSpec) -> Result<Self::Material, Self::Error>;
}

/// Externally owned mesh whose resources the LOD manager swaps.
pub trait LodMesh<G, M> {
  fn set_geometry(&mut self, geometry: Rc<G>);
  fn set_material(&mut self, material: Rc<M>);
  fn set_scale(&mut self, scale: f64);
  fn set_visible(&mut self, visible: bool);
}
