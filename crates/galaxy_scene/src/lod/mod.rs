//! Level-of-detail management.
//!
//! ```text
//! register_entity ──► EntityType preset × QualityProfile ──► Vec<LodLevel>
//!
//! get_lod_level(distance, zoom)            apply_lod(mesh, level)
//!   normalized = d / (base_size * zoom)      ├─ LruCache<Geometry> ─┐
//!   × (1 + (1 - importance) * bias)          ├─ LfuCache<Material> ─┼─► ResourceFactory
//!   vs level start × adaptive scale          └─► LodMesh (swap, scale, show)
//!
//! record_fps ──► AdaptiveController ──► adaptive scale
//! ```
//!
//! # Module Structure
//!
//! - [`entity`]: `EntityType` - closed set of entity kinds and their presets
//! - [`quality`]: `QualityProfile` - device-tier dependent per-level settings
//! - [`cache`]: `LruCache` / `LfuCache` - bounded resource caches
//! - [`factory`]: `ResourceFactory` / `LodMesh` - renderer contracts
//! - [`adaptive`]: `AdaptiveController` - FPS feedback on thresholds
//! - [`manager`]: `LodManager` - registration, selection and application

pub mod adaptive;
pub mod cache;
pub mod entity;
pub mod factory;
pub mod manager;
pub mod quality;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports
pub use adaptive::{AdaptiveConfig, AdaptiveController};
pub use cache::{CacheStats, Disposable, LfuCache, LruCache, ResourceKey};
pub use entity::{EntityPreset, EntityType, GeometryKind};
pub use factory::{GeometrySpec, LodMesh, MaterialSpec, ResourceFactory};
pub use manager::{ApplyOutcome, LodConfig, LodEntity, LodManager, LodStats, LodTransition, LodUpdateReport};
pub use quality::{DeviceTier, LodLevel, QualityProfile};
