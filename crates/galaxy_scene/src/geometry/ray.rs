//! Rays for picking.

use glam::DVec3;

use super::BoundingSphere;

/// Half-line starting at `origin` along a unit `direction`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
  pub origin: DVec3,
  /// Unit length, or zero when built from a degenerate direction.
  pub direction: DVec3,
}

impl Ray {
  /// Build a ray, normalizing `direction`.
  pub fn new(origin: DVec3, direction: DVec3) -> Self {
    Self {
      origin,
      direction: direction.normalize_or_zero(),
    }
  }

  /// False for a zero direction or non-finite components.
  pub fn is_valid(&self) -> bool {
    self.origin.is_finite() && self.direction.is_finite() && self.direction != DVec3::ZERO
  }

  /// Point at parameter `t` along the ray.
  #[inline]
  pub fn at(&self, t: f64) -> DVec3 {
    self.origin + self.direction * t
  }

  /// Distance along the ray to the first contact with `sphere`.
  ///
  /// Returns `Some(0.0)` when the origin is already inside the sphere and
  /// `None` when the sphere is missed or lies behind the origin.
  pub fn intersect_sphere(&self, sphere: &BoundingSphere) -> Option<f64> {
    let offset = self.origin - sphere.center;
    let b = offset.dot(self.direction);
    let c = offset.length_squared() - sphere.radius * sphere.radius;
    if c <= 0.0 {
      return Some(0.0);
    }
    if b > 0.0 {
      return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
      return None;
    }
    Some(-b - discriminant.sqrt())
  }
}
