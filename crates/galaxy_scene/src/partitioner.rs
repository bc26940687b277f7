//! SpatialPartitioner - the entry point for indexing and querying entities.
//!
//! Facade over the [`Octree`], the [`DynamicObjectManager`] and the
//! [`QueryCache`]:
//!
//! ```text
//! add/update/remove ──► validate ──► DynamicObjectManager ──► Octree
//!                                          │ deferred
//!                                          ▼
//!                              TaskQueue ──► tick() ──► flush batch
//!
//! query_sphere ──► QueryCache (TTL) ──miss──► Octree ──► reconcile lazy hits
//! ```
//!
//! Positions are validated here; the octree never sees NaN or negative radii.

use glam::DVec3;
use web_time::Instant;

use crate::constants::{DEFAULT_TASKS_PER_TICK, DEFAULT_VIEW_DISTANCE};
use crate::dynamic::{DynamicObjectManager, DynamicStats, UpdateBudget, UpdateOutcome, UpdateStrategy};
use crate::error::{SpatialError, SpatialResult};
use crate::geometry::{Frustum, Ray};
use crate::metrics::{self, SceneMetrics};
use crate::octree::{Octree, OctreeConfig, OctreeStats, SpatialObject};
use crate::query_cache::{QueryCache, QueryCacheConfig, QueryCacheStats};
use crate::task_queue::TaskQueue;
use crate::types::{EntityId, ObjectType, SpatialMetadata};

/// Partitioner configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionerConfig {
  pub octree: OctreeConfig,
  pub query_cache: QueryCacheConfig,
  pub budget: UpdateBudget,
  /// Visibility radius at zoom 1.0; divided by zoom.
  pub view_distance: f64,
  /// Scheduled tasks run per tick (0 = all).
  pub tasks_per_tick: usize,
}

impl PartitionerConfig {
  pub const DEFAULT: Self = Self {
    octree: OctreeConfig::DEFAULT,
    query_cache: QueryCacheConfig::DEFAULT,
    budget: UpdateBudget::DEFAULT,
    view_distance: DEFAULT_VIEW_DISTANCE,
    tasks_per_tick: DEFAULT_TASKS_PER_TICK,
  };

  /// Default settings over a custom world box.
  pub fn with_bounds(bounds: crate::geometry::Aabb) -> Self {
    Self {
      octree: OctreeConfig::with_bounds(bounds),
      ..Self::DEFAULT
    }
  }
}

impl Default for PartitionerConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// One ray intersection.
#[derive(Clone, Debug, PartialEq)]
pub struct RayHit {
  pub entity_id: EntityId,
  /// Distance along the ray to the first contact.
  pub distance: f64,
  pub point: DVec3,
}

/// Entity returned by [`SpatialPartitioner::get_visible_entities`].
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleEntity {
  pub entity_id: EntityId,
  /// Camera to entity center.
  pub distance: f64,
}

/// Frame work scheduled by the partitioner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PartitionTask {
  FlushDeferred,
}

/// Result of one [`SpatialPartitioner::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
  pub tasks_run: usize,
  pub updates_applied: usize,
  /// Deferred updates still buffered afterwards.
  pub pending_updates: usize,
}

/// Snapshot returned by [`SpatialPartitioner::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PartitionerStats {
  pub total_entities: usize,
  pub static_entities: usize,
  pub dynamic_entities: usize,
  pub frequent_entities: usize,
  pub massive_entities: usize,
  pub octree: OctreeStats,
  pub pending_updates: usize,
  pub dirty_objects: usize,
  pub scheduled_tasks: usize,
  pub query_cache: QueryCacheStats,
  pub dynamic: DynamicStats,
  /// Mean sphere/frustum query time, 0 without the `metrics` feature.
  pub avg_query_us: f64,
}

/// Spatial index of scene entities.
pub struct SpatialPartitioner {
  config: PartitionerConfig,
  octree: Octree,
  dynamic: DynamicObjectManager,
  cache: QueryCache,
  tasks: TaskQueue<PartitionTask>,
  flush_scheduled: bool,
  metrics: SceneMetrics,
}

impl Default for SpatialPartitioner {
  fn default() -> Self {
    Self::new(PartitionerConfig::DEFAULT)
  }
}

impl SpatialPartitioner {
  pub fn new(config: PartitionerConfig) -> Self {
    Self {
      octree: Octree::new(config.octree.clone()),
      dynamic: DynamicObjectManager::new(),
      cache: QueryCache::new(config.query_cache),
      tasks: TaskQueue::new(),
      flush_scheduled: false,
      metrics: SceneMetrics::new(),
      config,
    }
  }

  pub fn config(&self) -> &PartitionerConfig {
    &self.config
  }

  /// Read-only view of the index.
  pub fn octree(&self) -> &Octree {
    &self.octree
  }

  pub fn metrics(&self) -> &SceneMetrics {
    &self.metrics
  }

  pub fn contains(&self, id: &str) -> bool {
    self.octree.contains(id)
  }

  pub fn len(&self) -> usize {
    self.octree.len()
  }

  pub fn is_empty(&self) -> bool {
    self.octree.is_empty()
  }

  pub fn get(&self, id: &str) -> Option<&SpatialObject> {
    self.octree.get(id)
  }

  // ===========================================================================
  // Registration
  // ===========================================================================

  /// Index an entity. An existing entry with the same id is removed first.
  pub fn add_entity(
    &mut self,
    id: impl Into<EntityId>,
    position: DVec3,
    radius: f64,
    metadata: SpatialMetadata,
  ) -> SpatialResult<()> {
    let id = id.into();
    validate(&id, position, Some(radius))?;

    if self.contains(id.as_str()) {
      self.remove_entity(id.as_str())?;
    }

    if let Some(strategy) = UpdateStrategy::for_object_type(metadata.object_type) {
      self.dynamic.register(id.clone(), strategy);
    }
    self.octree.insert(SpatialObject::new(id, position, radius, metadata));
    Ok(())
  }

  /// Move an entity. Static entities are immutable and report
  /// [`SpatialError::StaticEntity`]. `immediate` forces synchronous
  /// relocation whatever the entity's strategy.
  pub fn update_entity(
    &mut self,
    id: &str,
    position: DVec3,
    radius: Option<f64>,
    immediate: bool,
  ) -> SpatialResult<UpdateOutcome> {
    let object = self
      .octree
      .get(id)
      .ok_or_else(|| SpatialError::UnknownEntity(id.into()))?;
    validate(&object.entity_id, position, radius)?;
    if object.object_type == ObjectType::Static {
      return Err(SpatialError::StaticEntity(id.into()));
    }

    let outcome = self
      .dynamic
      .update_position(&mut self.octree, id, position, radius, immediate)?;

    if outcome == UpdateOutcome::Queued && !self.flush_scheduled {
      self.tasks.enqueue(PartitionTask::FlushDeferred, None);
      self.flush_scheduled = true;
    }
    Ok(outcome)
  }

  /// Remove an entity, dropping any queued work that refers to it.
  pub fn remove_entity(&mut self, id: &str) -> SpatialResult<SpatialObject> {
    self.dynamic.unregister(id);
    self.tasks.cancel_owned_by(id);
    self
      .octree
      .remove(id)
      .ok_or_else(|| SpatialError::UnknownEntity(id.into()))
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  /// Entities whose bounding sphere touches the query sphere, memoized for
  /// the cache TTL. Cached ids removed since are filtered out.
  pub fn query_sphere(&mut self, center: DVec3, radius: f64) -> Vec<EntityId> {
    self.query_sphere_at(center, radius, Instant::now())
  }

  pub fn query_sphere_at(&mut self, center: DVec3, radius: f64, now: Instant) -> Vec<EntityId> {
    if !center.is_finite() || radius.is_nan() {
      return Vec::new();
    }

    if let Some(cached) = self.cache.get_at(center, radius, now) {
      let octree = &self.octree;
      return cached
        .iter()
        .filter(|id| octree.contains(id.as_str()))
        .cloned()
        .collect();
    }

    let results = self.query_sphere_uncached(center, radius);
    self.cache.insert_at(center, radius, results.clone(), now);
    results
  }

  /// Sphere query that bypasses the cache.
  pub fn query_sphere_uncached(&mut self, center: DVec3, radius: f64) -> Vec<EntityId> {
    if !center.is_finite() || radius.is_nan() {
      return Vec::new();
    }
    let start = metrics::is_enabled().then(Instant::now);
    let results = self.octree.query_sphere(center, radius);
    self.reconcile(&results);
    self.record_query(start);
    results
  }

  /// Entities at least partly inside the frustum. Never cached.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "partitioner::query_frustum"))]
  pub fn query_frustum(&mut self, frustum: &Frustum) -> Vec<EntityId> {
    let start = metrics::is_enabled().then(Instant::now);
    let results = self.octree.query_frustum(frustum);
    self.reconcile(&results);
    self.record_query(start);
    results
  }

  /// Closest entity within `max_distance`, measured to its bounding-sphere
  /// surface.
  pub fn find_nearest(&mut self, point: DVec3, max_distance: f64) -> Option<(EntityId, f64)> {
    if !point.is_finite() || max_distance.is_nan() {
      return None;
    }
    let nearest = self.octree.find_nearest(point, max_distance)?;
    self.reconcile(std::slice::from_ref(&nearest.0));
    Some(nearest)
  }

  /// Entities hit by `ray` within `max_distance`, nearest first.
  pub fn raycast(&mut self, ray: &Ray, max_distance: f64) -> Vec<RayHit> {
    if !ray.is_valid() || max_distance.is_nan() || max_distance < 0.0 {
      return Vec::new();
    }

    let candidates = self.query_sphere_uncached(ray.origin, max_distance);
    let mut hits: Vec<RayHit> = candidates
      .into_iter()
      .filter_map(|id| {
        let object = self.octree.get(id.as_str())?;
        let distance = ray.intersect_sphere(&object.bounding_sphere())?;
        (distance <= max_distance).then(|| RayHit {
          point: ray.at(distance),
          entity_id: id,
          distance,
        })
      })
      .collect();

    hits.sort_by(|a, b| {
      a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    hits
  }

  /// Entities within `view_distance / zoom` of the camera, optionally culled
  /// by `frustum`, nearest first.
  pub fn get_visible_entities(
    &mut self,
    camera: DVec3,
    zoom: f64,
    frustum: Option<&Frustum>,
  ) -> Vec<VisibleEntity> {
    let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
    let radius = self.config.view_distance / zoom;

    let candidates = self.query_sphere(camera, radius);
    let mut visible: Vec<VisibleEntity> = candidates
      .into_iter()
      .filter_map(|id| {
        let object = self.octree.get(id.as_str())?;
        if let Some(frustum) = frustum {
          if !frustum.intersects_sphere(object.position, object.radius) {
            return None;
          }
        }
        Some(VisibleEntity {
          distance: object.distance_to(camera),
          entity_id: id,
        })
      })
      .collect();

    visible.sort_by(|a, b| {
      a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    visible
  }

  fn reconcile(&mut self, ids: &[EntityId]) {
    if self.dynamic.dirty_count() == 0 {
      return;
    }
    let limit = self.config.budget.max_lazy_per_query;
    self.dynamic.update_lazy_objects(&mut self.octree, ids, limit);
  }

  fn record_query(&mut self, start: Option<Instant>) {
    if let Some(start) = start {
      self.metrics.record_query_timing(start.elapsed().as_micros() as u64);
    }
  }

  // ===========================================================================
  // Maintenance
  // ===========================================================================

  /// Rebuild the octree from scratch with identical bounds. Lazy objects are
  /// reinserted at their current position. Returns the number of objects.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "partitioner::rebalance"))]
  pub fn rebalance(&mut self) -> usize {
    let start = metrics::is_enabled().then(Instant::now);
    let count = self.octree.rebuild();
    self.dynamic.clear_dirty();
    self.cache.clear();

    if let Some(start) = start {
      self
        .metrics
        .record_rebalance_timing(start.elapsed().as_micros() as u64);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(objects = count, nodes = self.octree.node_count(), "octree rebalanced");

    count
  }

  /// Run scheduled work within the per-tick budget.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "partitioner::tick"))]
  pub fn tick(&mut self) -> TickReport {
    let mut report = TickReport::default();

    for task in self.tasks.drain(self.config.tasks_per_tick) {
      report.tasks_run += 1;
      match task {
        PartitionTask::FlushDeferred => {
          self.flush_scheduled = false;
          let batch = self.config.budget.max_updates_per_tick;
          report.updates_applied += self.dynamic.process_update_queue(&mut self.octree, batch);
        }
      }
    }

    if self.dynamic.pending_count() > 0 && !self.flush_scheduled {
      self.tasks.enqueue(PartitionTask::FlushDeferred, None);
      self.flush_scheduled = true;
    }

    report.pending_updates = self.dynamic.pending_count();
    report
  }

  pub fn stats(&self) -> PartitionerStats {
    let mut stats = PartitionerStats {
      total_entities: self.octree.len(),
      octree: self.octree.stats(),
      pending_updates: self.dynamic.pending_count(),
      dirty_objects: self.dynamic.dirty_count(),
      scheduled_tasks: self.tasks.pending_count(),
      query_cache: self.cache.stats(),
      dynamic: self.dynamic.stats(),
      avg_query_us: self.metrics.avg_query_timing_us(),
      ..Default::default()
    };

    for object in self.octree.iter_objects() {
      match object.object_type {
        ObjectType::Static => stats.static_entities += 1,
        ObjectType::Dynamic => stats.dynamic_entities += 1,
        ObjectType::Frequent => stats.frequent_entities += 1,
        ObjectType::Massive => stats.massive_entities += 1,
      }
    }
    stats
  }

  /// Drop every entity, queued update and cached query.
  pub fn dispose(&mut self) {
    self.tasks.clear();
    self.flush_scheduled = false;
    self.dynamic.clear();
    self.cache.clear();
    self.octree.clear();
    self.metrics.reset();
  }
}

fn validate(id: &EntityId, position: DVec3, radius: Option<f64>) -> SpatialResult<()> {
  if !position.is_finite() {
    return Err(SpatialError::InvalidPosition {
      id: id.clone(),
      position,
    });
  }
  if let Some(radius) = radius {
    if !radius.is_finite() || radius < 0.0 {
      return Err(SpatialError::InvalidRadius {
        id: id.clone(),
        radius,
      });
    }
  }
  Ok(())
}

#[cfg(test)]
#[path = "partitioner_test.rs"]
mod partitioner_test;
