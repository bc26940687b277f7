//! Renderer doubles for LOD tests.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use super::{Disposable, GeometrySpec, LodMesh, MaterialSpec, ResourceFactory};

#[derive(Debug)]
pub struct MockGeometry {
  pub spec: GeometrySpec,
  disposed: Rc<Cell<u32>>,
}

impl Disposable for MockGeometry {
  fn dispose(&self) {
    self.disposed.set(self.disposed.get() + 1);
  }
}

#[derive(Debug)]
pub struct MockMaterial {
  pub spec: MaterialSpec,
  disposed: Rc<Cell<u32>>,
}

impl Disposable for MockMaterial {
  fn dispose(&self) {
    self.disposed.set(self.disposed.get() + 1);
  }
}

/// Counts creations and disposals; fails geometry creation for the levels
/// in `failing_levels`.
#[derive(Debug, Default)]
pub struct MockFactory {
  pub geometries_created: u32,
  pub materials_created: u32,
  pub failing_levels: HashSet<usize>,
  pub disposed: Rc<Cell<u32>>,
}

impl MockFactory {
  pub fn failing(levels: &[usize]) -> Self {
    Self {
      failing_levels: levels.iter().copied().collect(),
      ..Default::default()
    }
  }

  pub fn disposed(&self) -> u32 {
    self.disposed.get()
  }
}

impl ResourceFactory for MockFactory {
  type Geometry = MockGeometry;
  type Material = MockMaterial;
  type Error = String;

  fn create_geometry(&mut self, spec: &GeometrySpec) -> Result<MockGeometry, String> {
    if self.failing_levels.contains(&spec.lod_level) {
      return Err(format!("no buffer for level {}", spec.lod_level));
    }
    self.geometries_created += 1;
    Ok(MockGeometry {
      spec: *spec,
      disposed: Rc::clone(&self.disposed),
    })
  }

  fn create_material(&mut self, spec: &MaterialSpec) -> Result<MockMaterial, String> {
    self.materials_created += 1;
    Ok(MockMaterial {
      spec: *spec,
      disposed: Rc::clone(&self.disposed),
    })
  }
}

#[derive(Debug)]
pub struct MockMesh {
  pub geometry: Option<Rc<MockGeometry>>,
  pub material: Option<Rc<MockMaterial>>,
  pub scale: f64,
  pub visible: bool,
  /// Number of setter calls.
  pub mutations: u32,
}

impl Default for MockMesh {
  fn default() -> Self {
    Self {
      geometry: None,
      material: None,
      scale: 1.0,
      visible: true,
      mutations: 0,
    }
  }
}

impl LodMesh<MockGeometry, MockMaterial> for MockMesh {
  fn set_geometry(&mut self, geometry: Rc<MockGeometry>) {
    self.geometry = Some(geometry);
    self.mutations += 1;
  }

  fn set_material(&mut self, material: Rc<MockMaterial>) {
    self.material = Some(material);
    self.mutations += 1;
  }

  fn set_scale(&mut self, scale: f64) {
    self.scale = scale;
    self.mutations += 1;
  }

  fn set_visible(&mut self, visible: bool) {
    self.visible = visible;
    self.mutations += 1;
  }
}
