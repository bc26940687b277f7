//! galaxy_scene - spatial indexing and level-of-detail management for a
//! navigable 3D "galaxy" of content entities.
//!
//! The crate is renderer independent. A host render loop owns one
//! [`SpatialPartitioner`] and one [`LodManager`], feeds them camera state and
//! FPS samples, and hands the LOD manager its own mesh handles through the
//! [`LodMesh`] trait.
//!
//! # Features
//!
//! - **Adaptive octree**: arena-backed nodes that split past a population
//!   threshold and merge back when it drops, with sphere, frustum, nearest and
//!   ray queries
//! - **Update strategies**: static entities are immutable, dynamic entities
//!   move immediately, in deferred batches, or lazily on read
//! - **LOD selection**: distance or screen-size driven, biased by importance
//! - **Resource caches**: LRU geometry cache and LFU material cache with an
//!   explicit disposal contract
//! - **Adaptive quality**: FPS feedback scales LOD distance thresholds
//!
//! # Frame loop
//!
//! ```ignore
//! use galaxy_scene::{DeviceTier, LodConfig, LodManager, SpatialPartitioner};
//!
//! let mut partitioner = SpatialPartitioner::default();
//! let mut lod = LodManager::new(factory, LodConfig::default(), DeviceTier::High);
//!
//! // every frame
//! partitioner.tick();
//! lod.tick();
//! let visible = partitioner.get_visible_entities(camera_pos, zoom, Some(&frustum));
//! let report = lod.update_lod_for_all(&visible, &mut meshes, zoom);
//! lod.record_fps(fps);
//! ```

pub mod constants;
pub mod error;
pub mod types;

pub use error::{LodError, ResourceKind, SpatialError};
pub use types::{EntityId, ObjectType, SpatialMetadata};

// Bounding volumes, rays and frusta
pub mod geometry;
pub use geometry::{Aabb, BoundingSphere, Frustum, Plane, Ray};

// Arena-backed adaptive octree
pub mod octree;
pub use octree::{NodeId, Octree, OctreeConfig, OctreeNode, SpatialObject};

// Frame-tick task scheduling with per-entity cancellation
pub mod task_queue;
pub use task_queue::{TaskId, TaskQueue};

// Rolling windows and optional timing collection
pub mod metrics;

pub mod query_cache;
pub use query_cache::{QueryCache, QueryCacheConfig};

pub mod dynamic;
pub use dynamic::{DynamicObjectManager, UpdateBudget, UpdateOutcome, UpdateStrategy};

pub mod partitioner;
pub use partitioner::{
  PartitionerConfig, PartitionerStats, RayHit, SpatialPartitioner, TickReport, VisibleEntity,
};

// Level-of-detail selection, caches and adaptive quality
pub mod lod;
pub use lod::{
  AdaptiveConfig, ApplyOutcome, DeviceTier, Disposable, EntityType, LodConfig, LodManager,
  LodMesh, LodStats, QualityProfile, ResourceFactory,
};
