//! Bounding volumes and query shapes in double precision.

pub mod aabb;
pub mod frustum;
pub mod ray;
pub mod sphere;

pub use aabb::Aabb;
pub use frustum::{Frustum, Plane};
pub use ray::Ray;
pub use sphere::BoundingSphere;
