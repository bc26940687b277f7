//! Tuning constants shared by the octree, the partitioner and the LOD manager.
//!
//! These are defaults only. Every value here is overridable through the
//! matching config struct ([`crate::OctreeConfig`], [`crate::PartitionerConfig`],
//! [`crate::LodConfig`]).

/// Leaf population above which a node splits into 8 octants.
pub const MAX_OBJECTS_PER_NODE: usize = 10;

/// Deepest level a node may reach (root = depth 0).
pub const MAX_DEPTH: u32 = 8;

/// Smallest edge length a child box may have. A node only splits while its
/// smallest extent exceeds `2 * MIN_NODE_SIZE`.
pub const MIN_NODE_SIZE: f64 = 1.0;

/// Half-extent of the default world box, centered on the origin.
pub const DEFAULT_WORLD_HALF_EXTENT: f64 = 5_000.0;

/// Lifetime of a memoized sphere query in milliseconds.
pub const QUERY_CACHE_TTL_MS: u64 = 100;

/// Grid step used to quantize query centers and radii into cache keys.
pub const QUERY_CACHE_QUANTUM: f64 = 1.0;

/// Maximum number of memoized sphere queries.
pub const QUERY_CACHE_MAX_ENTRIES: usize = 256;

/// Radius of the visibility sphere at zoom 1.0.
pub const DEFAULT_VIEW_DISTANCE: f64 = 2_000.0;

/// Deferred position updates applied per tick by default.
pub const DEFAULT_UPDATES_PER_TICK: usize = 64;

/// Scheduled tasks drained per tick by default.
pub const DEFAULT_TASKS_PER_TICK: usize = 16;

/// How strongly `(1 - importance)` stretches an entity's normalized distance.
///
/// `effective = normalized * (1 + (1 - importance) * IMPORTANCE_BIAS)`
pub const IMPORTANCE_BIAS: f64 = 1.0;

/// Floor for any scaled LOD distance threshold, in normalized units.
pub const MIN_DISTANCE_THRESHOLD: f64 = 1.0;

/// Default geometry (LRU) cache capacity.
pub const GEOMETRY_CACHE_CAPACITY: usize = 128;

/// Default material (LFU) cache capacity.
pub const MATERIAL_CACHE_CAPACITY: usize = 64;

/// Number of LOD transitions kept for inspection.
pub const TRANSITION_HISTORY: usize = 64;
