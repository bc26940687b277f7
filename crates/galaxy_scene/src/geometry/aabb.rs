//! Axis-aligned bounding box with double precision.

use glam::DVec3;

/// World-space box.
///
/// Octree nodes use the inclusive-min / exclusive-max convention when routing
/// points to children: a coordinate equal to the split plane belongs to the
/// upper octant. [`Aabb::contains_point`] itself is inclusive on both faces so
/// that the outer faces of the root still count as inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  pub min: DVec3,
  pub max: DVec3,
}

impl Aabb {
  /// Box spanning `min..=max`. Corners must be ordered on every axis.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(min.cmple(max).all(), "inverted box: min {min} max {max}");
    Self { min, max }
  }

  pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
    Self::new(center - half_extents, center + half_extents)
  }

  /// Shared faces count as overlap.
  #[inline]
  pub fn overlaps(&self, other: &Aabb) -> bool {
    self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
  }

  /// Inclusive on all six faces.
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.cmpge(self.min).all() && point.cmple(self.max).all()
  }

  /// Edge lengths.
  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  /// Smallest edge length.
  #[inline]
  pub fn min_extent(&self) -> f64 {
    self.size().min_element()
  }

  #[inline]
  pub fn center(&self) -> DVec3 {
    0.5 * (self.min + self.max)
  }

  /// Octant index of `point` relative to the center.
  ///
  /// Bits: X (bit 0), Y (bit 1), Z (bit 2). A coordinate equal to the center
  /// sets its bit, so split-plane points always route to the upper child.
  #[inline]
  pub fn octant_of(&self, point: DVec3) -> u8 {
    let center = self.center();
    (point.x >= center.x) as u8 | ((point.y >= center.y) as u8) << 1 | ((point.z >= center.z) as u8) << 2
  }

  /// Bounds of one of the 8 children produced by halving each axis.
  pub fn child(&self, octant: u8) -> Aabb {
    let center = self.center();
    let pick = |bit: u8, lo: f64, mid: f64, hi: f64| {
      if octant & bit != 0 {
        (mid, hi)
      } else {
        (lo, mid)
      }
    };
    let (min_x, max_x) = pick(1, self.min.x, center.x, self.max.x);
    let (min_y, max_y) = pick(2, self.min.y, center.y, self.max.y);
    let (min_z, max_z) = pick(4, self.min.z, center.z, self.max.z);
    Aabb {
      min: DVec3::new(min_x, min_y, min_z),
      max: DVec3::new(max_x, max_y, max_z),
    }
  }

  /// Grow every face outward by `margin`.
  #[inline]
  pub fn expand(&self, margin: f64) -> Aabb {
    Aabb {
      min: self.min - DVec3::splat(margin),
      max: self.max + DVec3::splat(margin),
    }
  }

  /// Squared distance from `point` to the closest point of the box (0 inside).
  #[inline]
  pub fn distance_squared_to_point(&self, point: DVec3) -> f64 {
    let closest = point.clamp(self.min, self.max);
    closest.distance_squared(point)
  }

  /// Distance from `point` to the closest point of the box (0 inside).
  #[inline]
  pub fn distance_to_point(&self, point: DVec3) -> f64 {
    self.distance_squared_to_point(point).sqrt()
  }

  /// Check if a sphere touches the box.
  #[inline]
  pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
    self.distance_squared_to_point(center) <= radius * radius
  }
}
