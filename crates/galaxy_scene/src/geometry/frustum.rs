//! View frustum made of six inward-facing planes.

use glam::{DMat4, DVec3, DVec4};

use super::Aabb;

/// Plane `normal . p + d = 0`; points with positive distance are inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
  pub normal: DVec3,
  pub d: f64,
}

impl Plane {
  pub fn new(normal: DVec3, d: f64) -> Self {
    Self { normal, d }
  }

  /// Plane from raw `(a, b, c, d)` coefficients, normalized.
  fn from_coefficients(v: DVec4) -> Self {
    let normal = v.truncate();
    let length = normal.length();
    if length > 0.0 {
      Self {
        normal: normal / length,
        d: v.w / length,
      }
    } else {
      Self { normal, d: v.w }
    }
  }

  /// Signed distance from `point` to the plane.
  #[inline]
  pub fn signed_distance(&self, point: DVec3) -> f64 {
    self.normal.dot(point) + self.d
  }
}

/// Camera view volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
  /// Left, right, bottom, top, near, far.
  pub planes: [Plane; 6],
}

impl Frustum {
  pub fn new(planes: [Plane; 6]) -> Self {
    Self { planes }
  }

  /// Extract the planes of a view-projection matrix (OpenGL clip space,
  /// z in [-1, 1]).
  pub fn from_view_projection(view_projection: DMat4) -> Self {
    let r0 = view_projection.row(0);
    let r1 = view_projection.row(1);
    let r2 = view_projection.row(2);
    let r3 = view_projection.row(3);
    Self {
      planes: [
        Plane::from_coefficients(r3 + r0),
        Plane::from_coefficients(r3 - r0),
        Plane::from_coefficients(r3 + r1),
        Plane::from_coefficients(r3 - r1),
        Plane::from_coefficients(r3 + r2),
        Plane::from_coefficients(r3 - r2),
      ],
    }
  }

  /// True if any part of the sphere is inside.
  #[inline]
  pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
    self
      .planes
      .iter()
      .all(|plane| plane.signed_distance(center) >= -radius)
  }

  /// Conservative box test using each plane's positive vertex.
  #[inline]
  pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
    self.planes.iter().all(|plane| {
      let positive = DVec3::select(plane.normal.cmpge(DVec3::ZERO), aabb.max, aabb.min);
      plane.signed_distance(positive) >= 0.0
    })
  }
}
