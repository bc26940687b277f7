//! Engine-agnostic timing and counter collection.
//!
//! Recording is compiled in only with the `metrics` feature; without it every
//! `record_*` call is a no-op. [`RollingWindow`] is always available since the
//! adaptive quality loop averages FPS samples with it.
//!
//! # Usage
//!
//! ```ignore
//! use galaxy_scene::metrics::SceneMetrics;
//!
//! // Compile with --features metrics
//! let mut metrics = SceneMetrics::new();
//! metrics.record_query_timing(elapsed_us);
//! println!("avg query: {:.1}us", metrics.avg_query_timing_us());
//! ```

use std::collections::VecDeque;

/// Number of LOD levels tracked by per-level counters.
pub const TRACKED_LOD_LEVELS: usize = 8;

/// Check if metrics collection is compiled in.
#[inline]
pub fn is_enabled() -> bool {
    cfg!(feature = "metrics")
}

/// Numeric value that can be averaged by [`RollingWindow::mean`].
pub trait Sample: Copy {
    fn to_f64(self) -> f64;
}

impl Sample for u64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for u32 {
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Sample for f64 {
    fn to_f64(self) -> f64 {
        self
    }
}

/// Fixed-size history; the oldest entry is dropped once full.
///
/// Holds FPS samples for the adaptive loop, LOD transitions and timings.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    entries: VecDeque<T>,
    limit: usize,
}

impl<T> RollingWindow<T> {
    /// `limit` is raised to 1 if zero.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, value: T) {
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }
}

impl<T: Sample> RollingWindow<T> {
    /// Arithmetic mean, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let total: f64 = self.entries.iter().map(|value| value.to_f64()).sum();
        Some(total / self.entries.len() as f64)
    }
}

impl<T: Copy + Ord> RollingWindow<T> {
    /// Smallest and largest entry.
    pub fn range(&self) -> Option<(T, T)> {
        let mut values = self.entries.iter().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), value| (lo.min(value), hi.max(value))))
    }
}

/// Scene-level timings and counters.
#[derive(Debug, Clone)]
pub struct SceneMetrics {
    // Timing
    /// Rolling window of spatial query times in microseconds.
    pub query_timings: RollingWindow<u64>,
    /// Rolling window of rebalance times in microseconds.
    pub rebalance_timings: RollingWindow<u64>,
    /// Rolling window of whole-scene LOD pass times in microseconds.
    pub lod_pass_timings: RollingWindow<u64>,

    // Counters
    /// LOD transitions into each level (index = level, last slot saturates).
    pub transitions_per_level: [u64; TRACKED_LOD_LEVELS],
    pub total_queries: u64,
    pub total_rebalances: u64,

    // Last frame snapshot
    pub last_query_us: u64,
    pub last_lod_pass_us: u64,
}

impl Default for SceneMetrics {
    fn default() -> Self {
        Self {
            query_timings: RollingWindow::new(128),
            rebalance_timings: RollingWindow::new(32),
            lod_pass_timings: RollingWindow::new(128),
            transitions_per_level: [0; TRACKED_LOD_LEVELS],
            total_queries: 0,
            total_rebalances: 0,
            last_query_us: 0,
            last_lod_pass_us: 0,
        }
    }
}

impl SceneMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset windows and snapshots. Cumulative totals are kept.
    pub fn reset(&mut self) {
        self.query_timings.clear();
        self.rebalance_timings.clear();
        self.lod_pass_timings.clear();
        self.transitions_per_level.fill(0);
        self.last_query_us = 0;
        self.last_lod_pass_us = 0;
    }

    pub fn record_query_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.query_timings.push(timing_us);
            self.last_query_us = timing_us;
            self.total_queries += 1;
        }
    }

    pub fn record_rebalance_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.rebalance_timings.push(timing_us);
            self.total_rebalances += 1;
        }
    }

    pub fn record_lod_pass_timing(&mut self, timing_us: u64) {
        if is_enabled() {
            self.lod_pass_timings.push(timing_us);
            self.last_lod_pass_us = timing_us;
        }
    }

    /// Count a transition into `level`.
    pub fn record_transition(&mut self, level: usize) {
        if is_enabled() {
            self.transitions_per_level[level.min(TRACKED_LOD_LEVELS - 1)] += 1;
        }
    }

    pub fn total_transitions(&self) -> u64 {
        self.transitions_per_level.iter().sum()
    }

    pub fn avg_query_timing_us(&self) -> f64 {
        self.query_timings.mean().unwrap_or(0.0)
    }

    pub fn avg_lod_pass_timing_us(&self) -> f64 {
        self.lod_pass_timings.mean().unwrap_or(0.0)
    }
}
