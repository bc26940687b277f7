//! Frame-tick task queue.
//!
//! Follows the stage pattern: Enqueue → Tick (drain a bounded batch) → Run
//!
//! Work that must not run inside the call that produced it (deferred octree
//! flushes, cache warm-up) is queued here and drained by the owner's `tick`.
//! Everything runs on the caller's thread; nothing fires after the owner is
//! dropped, because the owner holds the queue.
//!
//! Tasks may name an owning entity. Removing that entity cancels its tasks
//! via [`TaskQueue::cancel_owned_by`], so no stale work runs against it.

use std::collections::VecDeque;

use crate::types::EntityId;

/// Handle returned by [`TaskQueue::enqueue`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TaskId(u64);

impl TaskId {
  pub fn raw(self) -> u64 {
    self.0
  }
}

#[derive(Debug)]
struct QueuedTask<T> {
  id: TaskId,
  owner: Option<EntityId>,
  task: T,
}

/// FIFO of pending tasks, drained in bounded batches.
#[derive(Debug)]
pub struct TaskQueue<T> {
  pending: VecDeque<QueuedTask<T>>,
  next_id: u64,
  /// Tasks dropped through cancellation.
  cancelled: u64,
  /// Tasks handed out through `drain`.
  completed: u64,
}

impl<T> Default for TaskQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> TaskQueue<T> {
  pub fn new() -> Self {
    Self {
      pending: VecDeque::new(),
      next_id: 0,
      cancelled: 0,
      completed: 0,
    }
  }

  /// Enqueue a task, returning its ID.
  pub fn enqueue(&mut self, task: T, owner: Option<EntityId>) -> TaskId {
    let id = TaskId(self.next_id);
    self.next_id += 1;
    self.pending.push_back(QueuedTask { id, owner, task });
    id
  }

  /// Drop a pending task. Returns false when it already ran or was cancelled.
  pub fn cancel(&mut self, id: TaskId) -> bool {
    let before = self.pending.len();
    self.pending.retain(|queued| queued.id != id);
    let removed = before - self.pending.len();
    self.cancelled += removed as u64;
    removed > 0
  }

  /// Drop every pending task owned by `owner`, returning how many.
  pub fn cancel_owned_by(&mut self, owner: &str) -> usize {
    let before = self.pending.len();
    self
      .pending
      .retain(|queued| queued.owner.as_ref().map_or(true, |o| o.as_str() != owner));
    let removed = before - self.pending.len();
    self.cancelled += removed as u64;
    removed
  }

  /// Take up to `max` tasks in enqueue order (`0` = all).
  pub fn drain(&mut self, max: usize) -> Vec<T> {
    let count = if max == 0 {
      self.pending.len()
    } else {
      max.min(self.pending.len())
    };
    self.completed += count as u64;
    self.pending.drain(..count).map(|queued| queued.task).collect()
  }

  /// Run up to `max` tasks through `run` (`0` = all).
  /// Returns the number of tasks processed this tick.
  pub fn tick(&mut self, max: usize, mut run: impl FnMut(T)) -> usize {
    let batch = self.drain(max);
    let count = batch.len();
    for task in batch {
      run(task);
    }
    count
  }

  /// Whether any pending task belongs to `owner`.
  pub fn has_pending_for(&self, owner: &str) -> bool {
    self
      .pending
      .iter()
      .any(|queued| queued.owner.as_ref().is_some_and(|o| o.as_str() == owner))
  }

  /// Number of pending tasks.
  pub fn pending_count(&self) -> usize {
    self.pending.len()
  }

  pub fn cancelled_count(&self) -> u64 {
    self.cancelled
  }

  pub fn completed_count(&self) -> u64 {
    self.completed
  }

  /// True when no work remains.
  pub fn is_idle(&self) -> bool {
    self.pending.is_empty()
  }

  /// Drop all pending tasks without running them.
  pub fn clear(&mut self) {
    self.cancelled += self.pending.len() as u64;
    self.pending.clear();
  }
}

#[cfg(test)]
#[path = "task_queue_test.rs"]
mod task_queue_test;
