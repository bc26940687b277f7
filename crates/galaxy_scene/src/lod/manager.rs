//! LodManager - per-entity level selection and resource swapping.
//!
//! Follows the stage pattern: Register → Select → Apply
//!
//! 1. **Register**: build an entity's levels from its type preset and the
//!    active [`QualityProfile`].
//! 2. **Select**: pick a level from camera distance (or on-screen size),
//!    widened for low-importance entities and scaled by the adaptive
//!    controller.
//! 3. **Apply**: fetch or create the level's geometry and material through the
//!    caches and swap them onto the host's mesh. Creation failures fall back to
//!    level 0 once, then hide the mesh.
//!
//! Cache warm-up runs on the frame tick, never inside the call that asked for
//! it.

use std::collections::HashMap;
use std::rc::Rc;

use web_time::Instant;

use super::adaptive::AdaptiveController;
use super::cache::{CacheStats, Disposable, LfuCache, LruCache, ResourceKey};
use super::entity::EntityType;
use super::factory::{GeometrySpec, LodMesh, MaterialSpec, ResourceFactory};
use super::quality::{DeviceTier, LodLevel, QualityProfile};
use super::AdaptiveConfig;
use crate::constants::{
  DEFAULT_TASKS_PER_TICK, GEOMETRY_CACHE_CAPACITY, IMPORTANCE_BIAS, MATERIAL_CACHE_CAPACITY,
  MIN_DISTANCE_THRESHOLD, TRANSITION_HISTORY,
};
use crate::error::{LodError, LodResult, ResourceKind};
use crate::metrics::{self, RollingWindow, SceneMetrics};
use crate::partitioner::VisibleEntity;
use crate::task_queue::TaskQueue;
use crate::types::EntityId;

// =============================================================================
// Configuration and records
// =============================================================================

/// LOD manager configuration. The quality profile comes from the
/// [`DeviceTier`] passed to [`LodManager::new`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodConfig {
  /// Geometry (LRU) cache entries; at least 1.
  pub geometry_capacity: usize,
  /// Material (LFU) cache entries; at least 1.
  pub material_capacity: usize,
  pub adaptive: AdaptiveConfig,
  /// Schedule creation of level 0 resources when an entity registers.
  pub warm_up_on_register: bool,
  /// Warm-up tasks run per tick (0 = all).
  pub tasks_per_tick: usize,
}

impl LodConfig {
  pub const DEFAULT: Self = Self {
    geometry_capacity: GEOMETRY_CACHE_CAPACITY,
    material_capacity: MATERIAL_CACHE_CAPACITY,
    adaptive: AdaptiveConfig::DEFAULT,
    warm_up_on_register: false,
    tasks_per_tick: DEFAULT_TASKS_PER_TICK,
  };
}

impl Default for LodConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// LOD registration of one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct LodEntity {
  pub entity_type: EntityType,
  /// World-space size the unit geometry is scaled to.
  pub base_size: f64,
  /// Visual priority in `[0, 1]`.
  pub importance: f64,
  /// Ordered from most to least detailed.
  pub lod_levels: Vec<LodLevel>,
  /// Level bound to the mesh, `None` until the first apply or after the mesh
  /// was hidden.
  pub current_lod: Option<usize>,
}

impl LodEntity {
  /// `distance` normalized by size and zoom, stretched by `1 - importance`.
  pub fn effective_distance(&self, distance: f64, zoom: f64) -> f64 {
    let normalized = distance.max(0.0) / (self.base_size * sanitize_zoom(zoom));
    normalized * importance_factor(self.importance)
  }
}

/// Result of [`LodManager::apply_lod`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
  /// Already at the requested level; nothing was touched.
  Unchanged,
  Applied { level: usize },
  /// The requested level could not be created; level 0 is bound instead.
  FellBack { requested: usize, level: usize },
}

/// One level change, kept for inspection.
#[derive(Clone, Debug, PartialEq)]
pub struct LodTransition {
  pub entity_id: EntityId,
  pub from: Option<usize>,
  pub to: usize,
  pub distance: f64,
  pub at: Instant,
}

/// Summary of one [`LodManager::update_lod_for_all`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LodUpdateReport {
  pub processed: usize,
  /// Applied a new level (including fallbacks).
  pub changed: usize,
  pub unchanged: usize,
  /// Not registered or no mesh supplied.
  pub skipped: usize,
  /// Resource creation failed; the mesh is hidden.
  pub hidden: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LodStats {
  pub registered: usize,
  /// Entities bound to each level, indexed by level.
  pub per_level: Vec<usize>,
  /// Entities with no bound level.
  pub unassigned: usize,
  pub transitions: u64,
  pub geometry: CacheStats,
  pub material: CacheStats,
  pub adaptive_scale: f64,
  pub average_fps: Option<f64>,
  pub scheduled_tasks: usize,
  pub avg_pass_us: f64,
}

// =============================================================================
// Resource loading
// =============================================================================

/// Everything needed to fetch or create one level's resources.
#[derive(Clone, Copy, Debug)]
struct LevelRequest {
  entity_type: EntityType,
  base_size: f64,
  level: usize,
  detail: u32,
  texture_size: u32,
}

impl LevelRequest {
  fn new(entity_type: EntityType, base_size: f64, level: usize, lod: &LodLevel) -> Self {
    Self {
      entity_type,
      base_size,
      level,
      detail: lod.geometry_detail,
      texture_size: lod.texture_size,
    }
  }

  /// `None` when the entity has no such level.
  fn for_entity(entity: &LodEntity, level: usize) -> Option<Self> {
    let lod = entity.lod_levels.get(level)?;
    Some(Self::new(entity.entity_type, entity.base_size, level, lod))
  }
}

#[derive(Debug)]
struct WarmUp {
  request: LevelRequest,
  owner: Option<EntityId>,
}

struct ResourceCaches<G, M> {
  geometry: LruCache<G>,
  material: LfuCache<M>,
}

impl<G: Disposable, M: Disposable> ResourceCaches<G, M> {
  fn new(config: &LodConfig) -> Self {
    Self {
      geometry: LruCache::new(ResourceKind::Geometry, config.geometry_capacity.max(1)),
      material: LfuCache::new(ResourceKind::Material, config.material_capacity.max(1)),
    }
  }

  fn load<F>(&mut self, factory: &mut F, request: &LevelRequest, referrer: Option<&EntityId>) -> LodResult<(Rc<G>, Rc<M>)>
  where
    F: ResourceFactory<Geometry = G, Material = M>,
  {
    let geometry_spec = GeometrySpec {
      entity_type: request.entity_type,
      kind: request.entity_type.geometry_kind(),
      lod_level: request.level,
      detail: request.detail,
      base_size: request.base_size,
    };
    let geometry = self.geometry.get_or_try_insert_with(
      ResourceKey::geometry(request.entity_type, request.level, request.base_size),
      referrer,
      || factory.create_geometry(&geometry_spec),
    )?;

    let material_spec = MaterialSpec {
      entity_type: request.entity_type,
      lod_level: request.level,
      texture_size: request.texture_size,
    };
    let material = self.material.get_or_try_insert_with(
      ResourceKey::material(request.entity_type, request.level, request.texture_size),
      referrer,
      || factory.create_material(&material_spec),
    )?;

    Ok((geometry, material))
  }

  fn release_referrer(&mut self, id: &str) -> usize {
    self.geometry.release_referrer(id) + self.material.release_referrer(id)
  }

  fn trim(&mut self) -> usize {
    self.geometry.trim() + self.material.trim()
  }

  fn clear(&mut self) {
    self.geometry.clear();
    self.material.clear();
  }
}

// =============================================================================
// LodManager
// =============================================================================

/// Owns LOD registrations, the resource caches and the adaptive controller.
pub struct LodManager<F: ResourceFactory> {
  factory: F,
  config: LodConfig,
  profile: QualityProfile,
  entities: HashMap<EntityId, LodEntity>,
  caches: ResourceCaches<F::Geometry, F::Material>,
  adaptive: AdaptiveController,
  tasks: TaskQueue<WarmUp>,
  transitions: RollingWindow<LodTransition>,
  transition_count: u64,
  metrics: SceneMetrics,
}

impl<F: ResourceFactory> LodManager<F> {
  pub fn new(factory: F, config: LodConfig, tier: DeviceTier) -> Self {
    Self {
      factory,
      profile: QualityProfile::for_tier(tier),
      entities: HashMap::new(),
      caches: ResourceCaches::new(&config),
      adaptive: AdaptiveController::new(config.adaptive),
      tasks: TaskQueue::new(),
      transitions: RollingWindow::new(TRANSITION_HISTORY),
      transition_count: 0,
      metrics: SceneMetrics::new(),
      config,
    }
  }

  pub fn config(&self) -> &LodConfig {
    &self.config
  }

  pub fn profile(&self) -> &QualityProfile {
    &self.profile
  }

  pub fn factory(&self) -> &F {
    &self.factory
  }

  pub fn factory_mut(&mut self) -> &mut F {
    &mut self.factory
  }

  pub fn metrics(&self) -> &SceneMetrics {
    &self.metrics
  }

  pub fn len(&self) -> usize {
    self.entities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entities.is_empty()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.entities.contains_key(id)
  }

  pub fn entity(&self, id: &str) -> Option<&LodEntity> {
    self.entities.get(id)
  }

  pub fn current_lod(&self, id: &str) -> Option<usize> {
    self.entities.get(id).and_then(|entity| entity.current_lod)
  }

  pub fn adaptive_scale(&self) -> f64 {
    self.adaptive.scale()
  }

  /// Most recent level changes, oldest first.
  pub fn transitions(&self) -> impl Iterator<Item = &LodTransition> {
    self.transitions.iter()
  }

  /// Queued warm-up tasks.
  pub fn pending_warm_ups(&self) -> usize {
    self.tasks.pending_count()
  }

  fn lookup(&self, id: &str) -> LodResult<&LodEntity> {
    self.entities.get(id).ok_or_else(|| LodError::UnknownEntity(id.into()))
  }

  // ===========================================================================
  // Registration
  // ===========================================================================

  /// Register with the type's default importance.
  pub fn register_entity(&mut self, id: impl Into<EntityId>, entity_type: EntityType, base_size: f64) -> LodResult<()> {
    self.register_entity_with_importance(id, entity_type, base_size, entity_type.default_importance())
  }

  /// Register or replace an entity. Importance is clamped to `[0, 1]`; a
  /// non-finite value falls back to the type default.
  pub fn register_entity_with_importance(
    &mut self,
    id: impl Into<EntityId>,
    entity_type: EntityType,
    base_size: f64,
    importance: f64,
  ) -> LodResult<()> {
    let id = id.into();
    if !base_size.is_finite() || base_size <= 0.0 {
      return Err(LodError::InvalidBaseSize { id, base_size });
    }
    let importance = if importance.is_finite() {
      importance.clamp(0.0, 1.0)
    } else {
      entity_type.default_importance()
    };

    if self.entities.contains_key(id.as_str()) {
      self.release(id.as_str());
    }

    let entity = LodEntity {
      entity_type,
      base_size,
      importance,
      lod_levels: self.profile.build_levels(entity_type),
      current_lod: None,
    };

    // A profile without levels has nothing to warm up.
    let warm_up = LevelRequest::for_entity(&entity, 0).filter(|_| self.config.warm_up_on_register);
    if let Some(request) = warm_up {
      self.tasks.enqueue(
        WarmUp {
          request,
          owner: Some(id.clone()),
        },
        Some(id.clone()),
      );
    }

    self.entities.insert(id, entity);
    Ok(())
  }

  /// Drop the registration, cancel its warm-up tasks and purge cache entries
  /// only it referred to.
  pub fn unregister_entity(&mut self, id: &str) -> LodResult<LodEntity> {
    let entity = self
      .entities
      .remove(id)
      .ok_or_else(|| LodError::UnknownEntity(id.into()))?;
    self.release(id);
    Ok(entity)
  }

  fn release(&mut self, id: &str) -> usize {
    self.tasks.cancel_owned_by(id);
    let purged = self.caches.release_referrer(id);

    #[cfg(feature = "tracing")]
    tracing::debug!(entity = id, purged, "released LOD resources");

    purged
  }

  // ===========================================================================
  // Selection
  // ===========================================================================

  /// Level for `id` at camera `distance` and `zoom`.
  ///
  /// With `screen_size` (pixels) the first level whose threshold it reaches is
  /// chosen instead, falling back to the least detailed level.
  pub fn get_lod_level(&self, id: &str, distance: f64, zoom: f64, screen_size: Option<f64>) -> LodResult<usize> {
    let entity = self.lookup(id)?;
    let last = entity.lod_levels.len().saturating_sub(1);

    if let Some(size) = screen_size {
      return Ok(
        entity
          .lod_levels
          .iter()
          .position(|level| size >= level.screen_size)
          .unwrap_or(last),
      );
    }

    let effective = entity.effective_distance(distance, zoom);
    let scale = self.adaptive.scale();
    let mut chosen = 0;
    for (index, level) in entity.lod_levels.iter().enumerate() {
      if level_start(level, index, scale) > effective {
        break;
      }
      chosen = index;
    }
    Ok(chosen)
  }

  /// Normalized distance at which `level` begins, after adaptive scaling.
  pub fn level_threshold(&self, id: &str, level: usize) -> LodResult<f64> {
    let entity = self.lookup(id)?;
    let lod = entity.lod_levels.get(level).ok_or_else(|| LodError::InvalidLevel {
      id: id.into(),
      level,
      available: entity.lod_levels.len(),
    })?;
    Ok(level_start(lod, level, self.adaptive.scale()))
  }

  /// Camera distance at which `level` begins for `id` at `zoom`.
  pub fn distance_threshold(&self, id: &str, level: usize, zoom: f64) -> LodResult<f64> {
    let start = self.level_threshold(id, level)?;
    let entity = self.lookup(id)?;
    Ok(start * entity.base_size * sanitize_zoom(zoom) / importance_factor(entity.importance))
  }

  // ===========================================================================
  // Application
  // ===========================================================================

  /// Bind `level`'s resources to `mesh`.
  ///
  /// Does nothing when the entity is already at `level`. If creating the
  /// level's resources fails, level 0 is tried once; if that fails too the
  /// mesh is hidden and the error returned.
  pub fn apply_lod<M>(&mut self, mesh: &mut M, id: &str, level: usize, distance: f64) -> LodResult<ApplyOutcome>
  where
    M: LodMesh<F::Geometry, F::Material>,
  {
    let Some(entity) = self.entities.get_mut(id) else {
      return Err(LodError::UnknownEntity(id.into()));
    };
    if entity.current_lod == Some(level) {
      return Ok(ApplyOutcome::Unchanged);
    }
    let Some(request) = LevelRequest::for_entity(entity, level) else {
      return Err(LodError::InvalidLevel {
        id: id.into(),
        level,
        available: entity.lod_levels.len(),
      });
    };

    let entity_id = EntityId::from(id);
    let from = entity.current_lod;

    let (resources, applied, outcome) = match self.caches.load(&mut self.factory, &request, Some(&entity_id)) {
      Ok(resources) => (resources, level, ApplyOutcome::Applied { level }),
      Err(err) if level != 0 => {
        #[cfg(feature = "tracing")]
        tracing::warn!(entity = id, level, %err, "LOD resources unavailable, falling back to level 0");

        let outcome = ApplyOutcome::FellBack { requested: level, level: 0 };
        if from == Some(0) {
          return Ok(outcome);
        }
        let loaded = LevelRequest::for_entity(entity, 0)
          .ok_or(err)
          .and_then(|fallback| self.caches.load(&mut self.factory, &fallback, Some(&entity_id)));
        match loaded {
          Ok(resources) => (resources, 0, outcome),
          Err(err) => {
            mesh.set_visible(false);
            entity.current_lod = None;
            return Err(err);
          }
        }
      }
      Err(err) => {
        mesh.set_visible(false);
        entity.current_lod = None;
        return Err(err);
      }
    };

    let (geometry, material) = resources;
    mesh.set_geometry(geometry);
    mesh.set_material(material);
    mesh.set_scale(entity.base_size);
    mesh.set_visible(true);
    entity.current_lod = Some(applied);

    self.transitions.push(LodTransition {
      entity_id,
      from,
      to: applied,
      distance,
      at: Instant::now(),
    });
    self.transition_count += 1;
    self.metrics.record_transition(applied);

    Ok(outcome)
  }

  /// Select and apply levels for every visible entity that has a mesh.
  /// Failures are counted in the report, never propagated.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "lod::update_lod_for_all"))]
  pub fn update_lod_for_all<M>(
    &mut self,
    visible: &[VisibleEntity],
    meshes: &mut HashMap<EntityId, M>,
    zoom: f64,
  ) -> LodUpdateReport
  where
    M: LodMesh<F::Geometry, F::Material>,
  {
    let start = metrics::is_enabled().then(Instant::now);
    let mut report = LodUpdateReport::default();

    for entry in visible {
      report.processed += 1;
      let id = entry.entity_id.as_str();
      let Some(mesh) = meshes.get_mut(id) else {
        report.skipped += 1;
        continue;
      };
      let Ok(level) = self.get_lod_level(id, entry.distance, zoom, None) else {
        report.skipped += 1;
        continue;
      };

      match self.apply_lod(mesh, id, level, entry.distance) {
        Ok(ApplyOutcome::Unchanged) => report.unchanged += 1,
        Ok(_) => report.changed += 1,
        Err(LodError::UnknownEntity(_)) | Err(LodError::InvalidLevel { .. }) => report.skipped += 1,
        Err(_) => report.hidden += 1,
      }
    }
    // Meshes that switched level let go of their old resources.
    self.caches.trim();

    if let Some(start) = start {
      self
        .metrics
        .record_lod_pass_timing(start.elapsed().as_micros() as u64);
    }
    report
  }

  // ===========================================================================
  // Quality
  // ===========================================================================

  /// Switch profile. Every entity's levels are rebuilt and unbound, queued
  /// warm-ups are dropped and both caches are disposed; the next apply
  /// rebinds.
  pub fn set_quality_profile(&mut self, profile: QualityProfile) {
    for entity in self.entities.values_mut() {
      entity.lod_levels = profile.build_levels(entity.entity_type);
      entity.current_lod = None;
    }
    self.tasks.clear();
    self.caches.clear();

    #[cfg(feature = "tracing")]
    tracing::debug!(from = self.profile.name, to = profile.name, entities = self.entities.len(), "quality profile changed");

    self.profile = profile;
  }

  pub fn set_device_tier(&mut self, tier: DeviceTier) {
    self.set_quality_profile(QualityProfile::for_tier(tier));
  }

  /// Feed one FPS sample. Returns the new adaptive scale when it changed.
  pub fn record_fps(&mut self, fps: f64) -> Option<f64> {
    self.record_fps_at(fps, Instant::now())
  }

  pub fn record_fps_at(&mut self, fps: f64, now: Instant) -> Option<f64> {
    self.adaptive.record_sample_at(fps, now)
  }

  // ===========================================================================
  // Warm-up
  // ===========================================================================

  /// Queue creation of every level's resources for a type and size. Runs on
  /// [`LodManager::tick`]. Returns the number of tasks queued.
  pub fn warm_up(&mut self, entity_type: EntityType, base_size: f64) -> usize {
    if !base_size.is_finite() || base_size <= 0.0 {
      return 0;
    }
    let levels = self.profile.build_levels(entity_type);
    for (level, lod) in levels.iter().enumerate() {
      let request = LevelRequest::new(entity_type, base_size, level, lod);
      self.tasks.enqueue(WarmUp { request, owner: None }, None);
    }
    levels.len()
  }

  /// Run queued warm-ups within the per-tick budget. Returns how many ran.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "lod::tick"))]
  pub fn tick(&mut self) -> usize {
    let tasks = self.tasks.drain(self.config.tasks_per_tick);
    let count = tasks.len();
    for WarmUp { request, owner } in tasks {
      match self.caches.load(&mut self.factory, &request, owner.as_ref()) {
        Ok(_) => {}
        #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
        Err(err) => {
          #[cfg(feature = "tracing")]
          tracing::warn!(entity_type = %request.entity_type, level = request.level, %err, "warm-up failed");
        }
      }
    }
    count
  }

  // ===========================================================================
  // Inspection and teardown
  // ===========================================================================

  pub fn lod_stats(&self) -> LodStats {
    let mut per_level = vec![0; self.profile.level_count()];
    let mut unassigned = 0;
    for entity in self.entities.values() {
      match entity.current_lod {
        Some(level) => {
          if level >= per_level.len() {
            per_level.resize(level + 1, 0);
          }
          per_level[level] += 1;
        }
        None => unassigned += 1,
      }
    }

    LodStats {
      registered: self.entities.len(),
      per_level,
      unassigned,
      transitions: self.transition_count,
      geometry: self.caches.geometry.stats(),
      material: self.caches.material.stats(),
      adaptive_scale: self.adaptive.scale(),
      average_fps: self.adaptive.average_fps(),
      scheduled_tasks: self.tasks.pending_count(),
      avg_pass_us: self.metrics.avg_lod_pass_timing_us(),
    }
  }

  /// Dispose every cached resource and forget all registrations.
  pub fn dispose(&mut self) {
    self.tasks.clear();
    self.caches.clear();
    self.entities.clear();
    self.adaptive.reset();
    self.transitions.clear();
    self.transition_count = 0;
    self.metrics.reset();
  }
}

fn sanitize_zoom(zoom: f64) -> f64 {
  if zoom.is_finite() && zoom > 0.0 {
    zoom
  } else {
    1.0
  }
}

fn importance_factor(importance: f64) -> f64 {
  1.0 + (1.0 - importance) * IMPORTANCE_BIAS
}

/// Level 0 always starts at 0; later levels never start below the floor.
fn level_start(level: &LodLevel, index: usize, scale: f64) -> f64 {
  if index == 0 {
    0.0
  } else {
    (level.distance * scale).max(MIN_DISTANCE_THRESHOLD)
  }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
