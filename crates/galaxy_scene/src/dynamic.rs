//! Update strategies for moving entities.
//!
//! Every non-static entity is tracked under one of three strategies:
//!
//! ```text
//!   Immediate   update ──► remove + reinsert now
//!   Deferred    update ──► queue (coalesced) ──► process_update_queue(batch) ──► reinsert
//!   Lazy        update ──► object.dirty = true ──► update_lazy_objects(query hits) ──► reinsert
//! ```
//!
//! Each registration carries a generation token. Unregistering drops the
//! token and purges queued work, so a queued update never reaches an entity
//! that was removed or re-registered in the meantime.

use std::collections::{HashMap, HashSet, VecDeque};

use glam::DVec3;

use crate::constants::DEFAULT_UPDATES_PER_TICK;
use crate::error::{SpatialError, SpatialResult};
use crate::octree::Octree;
use crate::types::{EntityId, ObjectType};

/// How position updates reach the octree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateStrategy {
	/// Relocate synchronously on every update.
	Immediate,
	/// Buffer the latest position and relocate in bounded batches.
	Deferred,
	/// Mark dirty and relocate when a query returns the entity.
	Lazy,
}

impl UpdateStrategy {
	/// Strategy for an object type. Static objects are not tracked.
	pub fn for_object_type(object_type: ObjectType) -> Option<Self> {
		match object_type {
			ObjectType::Static => None,
			ObjectType::Frequent => Some(Self::Immediate),
			ObjectType::Dynamic => Some(Self::Deferred),
			ObjectType::Massive => Some(Self::Lazy),
		}
	}
}

/// Rate limiting for deferred relocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateBudget {
	/// Maximum deferred updates applied per tick (0 = unlimited).
	pub max_updates_per_tick: usize,
	/// Maximum lazy objects reconciled per query (0 = unlimited).
	pub max_lazy_per_query: usize,
}

impl UpdateBudget {
	/// Default budget with reasonable limits.
	pub const DEFAULT: Self = Self {
		max_updates_per_tick: DEFAULT_UPDATES_PER_TICK,
		max_lazy_per_query: 0,
	};

	/// Unlimited budget for testing or bulk loads.
	pub const UNLIMITED: Self = Self {
		max_updates_per_tick: usize::MAX,
		max_lazy_per_query: usize::MAX,
	};

	/// Check if more deferred updates can be applied this tick.
	#[inline]
	pub fn can_update(&self, performed: usize) -> bool {
		self.max_updates_per_tick == 0 || performed < self.max_updates_per_tick
	}

	/// Check if more lazy objects can be reconciled in this query.
	#[inline]
	pub fn can_reconcile(&self, performed: usize) -> bool {
		self.max_lazy_per_query == 0 || performed < self.max_lazy_per_query
	}
}

impl Default for UpdateBudget {
	fn default() -> Self {
		Self::DEFAULT
	}
}

/// What an accepted position update did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
	/// Relocated in the octree already.
	Applied,
	/// Buffered until the next flush.
	Queued,
	/// Moved in place and marked dirty.
	MarkedDirty,
}

/// Counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DynamicStats {
	pub immediate_updates: u64,
	pub deferred_applied: u64,
	/// Updates folded into an already queued entry.
	pub deferred_coalesced: u64,
	pub lazy_marked: u64,
	pub lazy_reconciled: u64,
	/// Queued entries dropped because their generation no longer matched.
	pub stale_dropped: u64,
}

#[derive(Clone, Copy, Debug)]
struct Tracked {
	strategy: UpdateStrategy,
	generation: u64,
}

#[derive(Clone, Copy, Debug)]
struct PendingUpdate {
	generation: u64,
	position: DVec3,
	radius: Option<f64>,
}

/// Per-entity update dispatcher sitting above the octree.
#[derive(Debug, Default)]
pub struct DynamicObjectManager {
	tracked: HashMap<EntityId, Tracked>,
	/// Flush order of deferred entities.
	queue: VecDeque<EntityId>,
	/// Latest buffered update per deferred entity.
	pending: HashMap<EntityId, PendingUpdate>,
	/// Lazy entities moved but not yet relocated.
	dirty: HashSet<EntityId>,
	next_generation: u64,
	stats: DynamicStats,
}

impl DynamicObjectManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Track an entity, replacing any previous registration. Returns the new
	/// generation token.
	pub fn register(&mut self, id: impl Into<EntityId>, strategy: UpdateStrategy) -> u64 {
		let id = id.into();
		self.purge(id.as_str());
		let generation = self.next_generation;
		self.next_generation += 1;
		self.tracked.insert(id, Tracked { strategy, generation });
		generation
	}

	/// Stop tracking an entity and drop its queued work.
	pub fn unregister(&mut self, id: &str) -> bool {
		self.purge(id);
		self.tracked.remove(id).is_some()
	}

	fn purge(&mut self, id: &str) {
		if self.pending.remove(id).is_some() {
			self.queue.retain(|queued| queued.as_str() != id);
		}
		self.dirty.remove(id);
	}

	pub fn is_tracked(&self, id: &str) -> bool {
		self.tracked.contains_key(id)
	}

	pub fn strategy_of(&self, id: &str) -> Option<UpdateStrategy> {
		self.tracked.get(id).map(|tracked| tracked.strategy)
	}

	pub fn generation_of(&self, id: &str) -> Option<u64> {
		self.tracked.get(id).map(|tracked| tracked.generation)
	}

	/// Route a position update through the entity's strategy.
	/// `force_immediate` takes the immediate path whatever the strategy.
	pub fn update_position(
		&mut self,
		octree: &mut Octree,
		id: &str,
		position: DVec3,
		radius: Option<f64>,
		force_immediate: bool,
	) -> SpatialResult<UpdateOutcome> {
		let tracked = *self
			.tracked
			.get(id)
			.ok_or_else(|| SpatialError::UnknownEntity(id.into()))?;

		let strategy = if force_immediate {
			UpdateStrategy::Immediate
		} else {
			tracked.strategy
		};

		match strategy {
			UpdateStrategy::Immediate => {
				// A forced move supersedes anything buffered.
				self.purge(id);
				if !octree.relocate(id, position, radius) {
					return Err(SpatialError::UnknownEntity(id.into()));
				}
				self.stats.immediate_updates += 1;
				Ok(UpdateOutcome::Applied)
			}
			UpdateStrategy::Deferred => {
				let update = PendingUpdate {
					generation: tracked.generation,
					position,
					radius,
				};
				match self.pending.insert(id.into(), update) {
					Some(_) => self.stats.deferred_coalesced += 1,
					None => self.queue.push_back(id.into()),
				}
				Ok(UpdateOutcome::Queued)
			}
			UpdateStrategy::Lazy => {
				if !octree.update_in_place(id, position, radius) {
					return Err(SpatialError::UnknownEntity(id.into()));
				}
				self.dirty.insert(id.into());
				self.stats.lazy_marked += 1;
				Ok(UpdateOutcome::MarkedDirty)
			}
		}
	}

	/// Apply up to `batch_size` buffered updates in arrival order
	/// (0 = all). Returns the number applied.
	#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "dynamic::flush"))]
	pub fn process_update_queue(&mut self, octree: &mut Octree, batch_size: usize) -> usize {
		let mut applied = 0;
		while batch_size == 0 || applied < batch_size {
			let Some(id) = self.queue.pop_front() else {
				break;
			};
			let Some(update) = self.pending.remove(&id) else {
				continue;
			};

			let current = self.tracked.get(&id).map(|tracked| tracked.generation);
			if current != Some(update.generation) {
				self.stats.stale_dropped += 1;
				continue;
			}

			if octree.relocate(id.as_str(), update.position, update.radius) {
				applied += 1;
				self.stats.deferred_applied += 1;
			} else {
				self.stats.stale_dropped += 1;
			}
		}
		applied
	}

	/// Relocate dirty lazy objects among `ids`, at most `limit` (0 = all).
	/// Returns the number relocated.
	pub fn update_lazy_objects<'a>(
		&mut self,
		octree: &mut Octree,
		ids: impl IntoIterator<Item = &'a EntityId>,
		limit: usize,
	) -> usize {
		let mut reconciled = 0;
		for id in ids {
			if limit != 0 && reconciled >= limit {
				break;
			}
			if !self.dirty.remove(id.as_str()) {
				continue;
			}
			if octree.reseat(id.as_str()) {
				reconciled += 1;
			}
		}
		self.stats.lazy_reconciled += reconciled as u64;
		reconciled
	}

	/// Relocate every dirty lazy object.
	pub fn reconcile_all(&mut self, octree: &mut Octree) -> usize {
		let dirty: Vec<EntityId> = self.dirty.iter().cloned().collect();
		self.update_lazy_objects(octree, &dirty, 0)
	}

	/// Deferred updates waiting for a flush.
	pub fn pending_count(&self) -> usize {
		self.pending.len()
	}

	pub fn has_pending(&self, id: &str) -> bool {
		self.pending.contains_key(id)
	}

	/// Lazy objects moved but not yet relocated.
	pub fn dirty_count(&self) -> usize {
		self.dirty.len()
	}

	pub fn is_dirty(&self, id: &str) -> bool {
		self.dirty.contains(id)
	}

	pub fn tracked_count(&self) -> usize {
		self.tracked.len()
	}

	pub fn stats(&self) -> DynamicStats {
		self.stats
	}

	/// Forget dirty marks after the octree reconciled every object itself.
	pub fn clear_dirty(&mut self) {
		self.dirty.clear();
	}

	/// Forget all pending work. Tracking survives.
	pub fn clear_pending(&mut self) {
		self.queue.clear();
		self.pending.clear();
		self.dirty.clear();
	}

	/// Drop everything.
	pub fn clear(&mut self) {
		self.clear_pending();
		self.tracked.clear();
	}
}

#[cfg(test)]
#[path = "dynamic_test.rs"]
mod dynamic_test;
