//! Bounding spheres.

use glam::DVec3;

use super::Aabb;

/// Sphere enclosing an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
  pub center: DVec3,
  pub radius: f64,
}

impl BoundingSphere {
  pub fn new(center: DVec3, radius: f64) -> Self {
    Self { center, radius }
  }

  /// True when the two spheres touch or overlap.
  #[inline]
  pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
    let reach = self.radius + radius;
    self.center.distance_squared(center) <= reach * reach
  }

  /// True when the sphere touches the box.
  #[inline]
  pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
    aabb.intersects_sphere(self.center, self.radius)
  }

  /// Distance from `point` to the sphere surface, 0 when inside.
  #[inline]
  pub fn surface_distance(&self, point: DVec3) -> f64 {
    (self.center.distance(point) - self.radius).max(0.0)
  }
}
