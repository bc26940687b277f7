//! Render-resource caches.
//!
//! Geometry uses least-recently-used eviction ([`LruCache`]) and materials
//! least-frequently-used ([`LfuCache`]). Values are shared with meshes as
//! `Rc`s. An entry is only evicted while the cache holds its last handle, and
//! eviction calls [`Disposable::dispose`] explicitly since the resource is
//! bound to GPU state owned elsewhere.
//!
//! When every entry is bound the cache grows past its capacity rather than
//! refuse a resource a visible mesh needs. The excess is evicted again as
//! soon as meshes let go of entries.
//!
//! Every entry records which entities asked for it so that unregistering an
//! entity can purge entries nobody else refers to.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use super::EntityType;
use crate::error::{LodError, LodResult, ResourceKind};
use crate::types::EntityId;

/// Explicit release of externally owned resource state.
pub trait Disposable {
  fn dispose(&self);
}

/// Cache key. Displays as `"{type}_{level}_{size}"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
  pub entity_type: EntityType,
  pub lod_level: usize,
  /// Rounded base size for geometry, texture size for materials.
  pub size_key: u32,
}

impl ResourceKey {
  pub fn geometry(entity_type: EntityType, lod_level: usize, base_size: f64) -> Self {
    Self {
      entity_type,
      lod_level,
      size_key: base_size.round().max(0.0) as u32,
    }
  }

  pub fn material(entity_type: EntityType, lod_level: usize, texture_size: u32) -> Self {
    Self {
      entity_type,
      lod_level,
      size_key: texture_size,
    }
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{}_{}", self.entity_type, self.lod_level, self.size_key)
  }
}

// =============================================================================
// Eviction policies
// =============================================================================

/// Ordering of eviction candidates.
pub trait EvictionPolicy: Default {
  fn on_insert(&mut self, key: &ResourceKey, stamp: u64);
  fn on_access(&mut self, key: &ResourceKey, stamp: u64);
  fn on_remove(&mut self, key: &ResourceKey);
  /// First key in eviction order for which `is_bound` is false.
  fn next_victim(&self, is_bound: &dyn Fn(&ResourceKey) -> bool) -> Option<ResourceKey>;
  fn clear(&mut self);
}

/// Least recently used first.
#[derive(Debug, Default)]
pub struct Lru {
  by_stamp: BTreeMap<u64, ResourceKey>,
  stamps: HashMap<ResourceKey, u64>,
}

impl Lru {
  fn touch(&mut self, key: &ResourceKey, stamp: u64) {
    if let Some(previous) = self.stamps.insert(*key, stamp) {
      self.by_stamp.remove(&previous);
    }
    self.by_stamp.insert(stamp, *key);
  }
}

impl EvictionPolicy for Lru {
  fn on_insert(&mut self, key: &ResourceKey, stamp: u64) {
    self.touch(key, stamp);
  }

  fn on_access(&mut self, key: &ResourceKey, stamp: u64) {
    self.touch(key, stamp);
  }

  fn on_remove(&mut self, key: &ResourceKey) {
    if let Some(stamp) = self.stamps.remove(key) {
      self.by_stamp.remove(&stamp);
    }
  }

  fn next_victim(&self, is_bound: &dyn Fn(&ResourceKey) -> bool) -> Option<ResourceKey> {
    self.by_stamp.values().find(|key| !is_bound(key)).copied()
  }

  fn clear(&mut self) {
    self.by_stamp.clear();
    self.stamps.clear();
  }
}

/// Least frequently used first; ties go to the least recently used.
#[derive(Debug, Default)]
pub struct Lfu {
  /// (access count, last stamp) -> key
  by_rank: BTreeMap<(u64, u64), ResourceKey>,
  ranks: HashMap<ResourceKey, (u64, u64)>,
}

impl EvictionPolicy for Lfu {
  fn on_insert(&mut self, key: &ResourceKey, stamp: u64) {
    self.on_remove(key);
    self.ranks.insert(*key, (1, stamp));
    self.by_rank.insert((1, stamp), *key);
  }

  fn on_access(&mut self, key: &ResourceKey, stamp: u64) {
    let count = match self.ranks.get(key) {
      Some(&rank) => {
        self.by_rank.remove(&rank);
        rank.0 + 1
      }
      None => 1,
    };
    self.ranks.insert(*key, (count, stamp));
    self.by_rank.insert((count, stamp), *key);
  }

  fn on_remove(&mut self, key: &ResourceKey) {
    if let Some(rank) = self.ranks.remove(key) {
      self.by_rank.remove(&rank);
    }
  }

  fn next_victim(&self, is_bound: &dyn Fn(&ResourceKey) -> bool) -> Option<ResourceKey> {
    self.by_rank.values().find(|key| !is_bound(key)).copied()
  }

  fn clear(&mut self) {
    self.by_rank.clear();
    self.ranks.clear();
  }
}

// =============================================================================
// Cache
// =============================================================================

/// Counters and occupancy of one cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub len: usize,
  pub capacity: usize,
  pub hits: u64,
  pub misses: u64,
  pub evictions: u64,
  /// Entries disposed through eviction, purge or clear.
  pub disposed: u64,
  /// Inserts that found every entry bound and grew past `capacity`.
  pub overflows: u64,
}

struct CacheEntry<V> {
  value: Rc<V>,
  referrers: HashSet<EntityId>,
}

/// Bounded resource cache with a pluggable eviction policy.
pub struct ResourceCache<V, P> {
  kind: ResourceKind,
  capacity: usize,
  entries: HashMap<ResourceKey, CacheEntry<V>>,
  policy: P,
  clock: u64,
  hits: u64,
  misses: u64,
  evictions: u64,
  disposed: u64,
  overflows: u64,
}

/// Geometry cache.
pub type LruCache<V> = ResourceCache<V, Lru>;

/// Material cache.
pub type LfuCache<V> = ResourceCache<V, Lfu>;

impl<V: Disposable, P: EvictionPolicy> ResourceCache<V, P> {
  pub fn new(kind: ResourceKind, capacity: usize) -> Self {
    Self {
      kind,
      capacity,
      entries: HashMap::new(),
      policy: P::default(),
      clock: 0,
      hits: 0,
      misses: 0,
      evictions: 0,
      disposed: 0,
      overflows: 0,
    }
  }

  pub fn kind(&self) -> ResourceKind {
    self.kind
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn contains(&self, key: &ResourceKey) -> bool {
    self.entries.contains_key(key)
  }

  /// Entities that requested `key`.
  pub fn referrer_count(&self, key: &ResourceKey) -> usize {
    self.entries.get(key).map_or(0, |entry| entry.referrers.len())
  }

  fn tick(&mut self) -> u64 {
    self.clock += 1;
    self.clock
  }

  /// Look up an entry, counting the access.
  pub fn get(&mut self, key: &ResourceKey) -> Option<Rc<V>> {
    let stamp = self.tick();
    match self.entries.get(key) {
      Some(entry) => {
        self.hits += 1;
        self.policy.on_access(key, stamp);
        Some(Rc::clone(&entry.value))
      }
      None => {
        self.misses += 1;
        None
      }
    }
  }

  /// Return the cached value for `key` or create, store and return it.
  ///
  /// Room is made before `create` runs. A full cache of bound entries grows
  /// past its capacity instead of failing. Only a zero-capacity cache fails
  /// with [`LodError::Capacity`], without creating anything.
  pub fn get_or_try_insert_with<E: fmt::Display>(
    &mut self,
    key: ResourceKey,
    referrer: Option<&EntityId>,
    create: impl FnOnce() -> Result<V, E>,
  ) -> LodResult<Rc<V>> {
    let stamp = self.tick();
    if let Some(entry) = self.entries.get_mut(&key) {
      self.hits += 1;
      self.policy.on_access(&key, stamp);
      if let Some(referrer) = referrer {
        entry.referrers.insert(referrer.clone());
      }
      return Ok(Rc::clone(&entry.value));
    }

    self.misses += 1;
    self.make_room()?;
    let value = create().map_err(|err| LodError::ResourceCreation {
      kind: self.kind,
      key: key.to_string(),
      message: err.to_string(),
    })?;
    Ok(self.store(key, value, referrer, stamp))
  }

  /// Insert a value, replacing (and disposing) any previous one.
  pub fn insert(&mut self, key: ResourceKey, value: V, referrer: Option<&EntityId>) -> LodResult<Rc<V>> {
    self.remove(&key);
    self.make_room()?;
    let stamp = self.tick();
    Ok(self.store(key, value, referrer, stamp))
  }

  fn store(&mut self, key: ResourceKey, value: V, referrer: Option<&EntityId>, stamp: u64) -> Rc<V> {
    let value = Rc::new(value);
    let mut referrers = HashSet::new();
    if let Some(referrer) = referrer {
      referrers.insert(referrer.clone());
    }
    self.entries.insert(
      key,
      CacheEntry {
        value: Rc::clone(&value),
        referrers,
      },
    );
    self.policy.on_insert(&key, stamp);
    value
  }

  /// Evict until one slot is free. Entries still bound to a mesh are
  /// skipped, and if only bound entries remain the cache overflows.
  fn make_room(&mut self) -> LodResult<()> {
    if self.capacity == 0 {
      return Err(LodError::Capacity {
        kind: self.kind,
        capacity: self.capacity,
      });
    }
    self.evict_down_to(self.capacity - 1);
    if self.entries.len() >= self.capacity {
      self.overflows += 1;

      #[cfg(feature = "tracing")]
      tracing::debug!(
        kind = %self.kind,
        len = self.entries.len(),
        capacity = self.capacity,
        "all cached resources bound, growing past capacity"
      );
    }
    Ok(())
  }

  /// Evict unbound entries while the cache is over capacity. Returns how
  /// many were evicted.
  pub fn trim(&mut self) -> usize {
    self.evict_down_to(self.capacity)
  }

  fn evict_down_to(&mut self, target: usize) -> usize {
    let mut evicted = 0;
    while self.entries.len() > target {
      let entries = &self.entries;
      let victim = self.policy.next_victim(&|key| {
        entries
          .get(key)
          .is_some_and(|entry| Rc::strong_count(&entry.value) > 1)
      });
      let Some(victim) = victim else {
        break;
      };

      #[cfg(feature = "tracing")]
      tracing::debug!(kind = %self.kind, key = %victim, "evicting cached resource");

      self.remove(&victim);
      self.evictions += 1;
      evicted += 1;
    }
    evicted
  }

  /// Remove and dispose an entry. Returns false if absent.
  pub fn remove(&mut self, key: &ResourceKey) -> bool {
    match self.entries.remove(key) {
      Some(entry) => {
        self.policy.on_remove(key);
        entry.value.dispose();
        self.disposed += 1;
        true
      }
      None => false,
    }
  }

  /// Forget `id` as a referrer. Entries it alone referred to are removed
  /// and disposed unless a mesh still holds them. Returns how many.
  pub fn release_referrer(&mut self, id: &str) -> usize {
    let mut orphaned = Vec::new();
    for (key, entry) in self.entries.iter_mut() {
      if entry.referrers.remove(id) && entry.referrers.is_empty() && Rc::strong_count(&entry.value) == 1 {
        orphaned.push(*key);
      }
    }
    for key in &orphaned {
      self.remove(key);
    }
    self.trim();
    orphaned.len()
  }

  /// Dispose every entry.
  pub fn clear(&mut self) {
    for (_, entry) in self.entries.drain() {
      entry.value.dispose();
      self.disposed += 1;
    }
    self.policy.clear();
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      len: self.entries.len(),
      capacity: self.capacity,
      hits: self.hits,
      misses: self.misses,
      evictions: self.evictions,
      disposed: self.disposed,
      overflows: self.overflows,
    }
  }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
