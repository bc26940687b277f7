//! Short-lived memoization of sphere queries.
//!
//! Entries expire by TTL only. Writes to the index never invalidate them, so a
//! hit may list an entity that has since moved. Callers needing strict
//! freshness use the uncached query path.

use std::collections::HashMap;
use std::time::Duration;

use glam::DVec3;
use web_time::Instant;

use crate::constants::{QUERY_CACHE_MAX_ENTRIES, QUERY_CACHE_QUANTUM, QUERY_CACHE_TTL_MS};
use crate::types::EntityId;

/// Sphere query cache settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryCacheConfig {
  /// Lifetime of an entry.
  pub ttl: Duration,
  /// Grid step for quantizing centers and radii.
  pub quantum: f64,
  /// Entry bound (0 = caching disabled).
  pub max_entries: usize,
}

impl QueryCacheConfig {
  pub const DEFAULT: Self = Self {
    ttl: Duration::from_millis(QUERY_CACHE_TTL_MS),
    quantum: QUERY_CACHE_QUANTUM,
    max_entries: QUERY_CACHE_MAX_ENTRIES,
  };

  /// Never stores anything.
  pub const DISABLED: Self = Self {
    ttl: Duration::ZERO,
    quantum: QUERY_CACHE_QUANTUM,
    max_entries: 0,
  };
}

impl Default for QueryCacheConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}

/// Quantized query center and radius.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SphereQueryKey {
  center: [i64; 3],
  radius: i64,
}

impl SphereQueryKey {
  /// Snap to the `quantum` grid. Infinite radii saturate.
  pub fn quantize(center: DVec3, radius: f64, quantum: f64) -> Self {
    let quantum = if quantum > 0.0 { quantum } else { QUERY_CACHE_QUANTUM };
    let snap = |value: f64| (value / quantum).round() as i64;
    Self {
      center: [snap(center.x), snap(center.y), snap(center.z)],
      radius: snap(radius),
    }
  }
}

#[derive(Debug)]
struct CachedQuery {
  ids: Vec<EntityId>,
  inserted_at: Instant,
}

/// Hit/miss counters and occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryCacheStats {
  pub entries: usize,
  pub hits: u64,
  pub misses: u64,
}

/// TTL cache of sphere query results.
#[derive(Debug)]
pub struct QueryCache {
  config: QueryCacheConfig,
  entries: HashMap<SphereQueryKey, CachedQuery>,
  hits: u64,
  misses: u64,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new(QueryCacheConfig::DEFAULT)
  }
}

impl QueryCache {
  pub fn new(config: QueryCacheConfig) -> Self {
    Self {
      config,
      entries: HashMap::new(),
      hits: 0,
      misses: 0,
    }
  }

  pub fn config(&self) -> &QueryCacheConfig {
    &self.config
  }

  pub fn key(&self, center: DVec3, radius: f64) -> SphereQueryKey {
    SphereQueryKey::quantize(center, radius, self.config.quantum)
  }

  pub fn get(&mut self, center: DVec3, radius: f64) -> Option<&[EntityId]> {
    self.get_at(center, radius, Instant::now())
  }

  /// Look up a live entry. Expired entries are dropped and count as misses.
  pub fn get_at(&mut self, center: DVec3, radius: f64, now: Instant) -> Option<&[EntityId]> {
    let key = self.key(center, radius);
    let ttl = self.config.ttl;

    let expired = match self.entries.get(&key) {
      None => {
        self.misses += 1;
        return None;
      }
      Some(entry) => now.saturating_duration_since(entry.inserted_at) >= ttl,
    };

    if expired {
      self.entries.remove(&key);
      self.misses += 1;
      return None;
    }

    self.hits += 1;
    self.entries.get(&key).map(|entry| entry.ids.as_slice())
  }

  pub fn insert(&mut self, center: DVec3, radius: f64, ids: Vec<EntityId>) {
    self.insert_at(center, radius, ids, Instant::now());
  }

  /// Store a result, making room by dropping expired entries and then the
  /// oldest one.
  pub fn insert_at(&mut self, center: DVec3, radius: f64, ids: Vec<EntityId>, now: Instant) {
    if self.config.max_entries == 0 {
      return;
    }
    let key = self.key(center, radius);

    if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
      self.purge_expired_at(now);
      if self.entries.len() >= self.config.max_entries {
        self.evict_oldest();
      }
    }

    self.entries.insert(key, CachedQuery { ids, inserted_at: now });
  }

  /// Drop every expired entry, returning how many.
  pub fn purge_expired_at(&mut self, now: Instant) -> usize {
    let ttl = self.config.ttl;
    let before = self.entries.len();
    self
      .entries
      .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < ttl);
    before - self.entries.len()
  }

  fn evict_oldest(&mut self) {
    let oldest = self
      .entries
      .iter()
      .min_by_key(|(_, entry)| entry.inserted_at)
      .map(|(key, _)| *key);
    if let Some(key) = oldest {
      self.entries.remove(&key);
    }
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn stats(&self) -> QueryCacheStats {
    QueryCacheStats {
      entries: self.entries.len(),
      hits: self.hits,
      misses: self.misses,
    }
  }
}
