//! Documented constants for the temporal memory store
//!
//! Tunables that are not part of the frozen runtime configuration live here,
//! with their units and the code that consumes them.

// =============================================================================
// RETRIEVAL CANDIDATE SIZING
// Used by retrieval.rs when building the per-kind candidate pool.
// =============================================================================

/// Lower bound on the per-kind candidate pool, regardless of the query limit.
///
/// `N = min(MAX_CANDIDATES_PER_KIND, max(limit * CANDIDATE_POOL_MULTIPLIER,
/// CANDIDATE_POOL_FLOOR))` for both lexical and vector candidate fetches.
pub const CANDIDATE_POOL_FLOOR: usize = 50;

/// Candidate pool size as a multiple of the requested result limit.
pub const CANDIDATE_POOL_MULTIPLIER: usize = 5;

/// Hard cap on candidates fetched per kind per query (the store limit).
pub const MAX_CANDIDATES_PER_KIND: usize = 500;

/// Raw BM25 scores at or below this floor are dropped before normalization.
/// Implementation parameter, not a core invariant.
pub const MIN_LEXICAL_SCORE: f64 = 0.0;

/// Default `limit` for a retrieval query that does not specify one.
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 10;

// =============================================================================
// WRITE DEFAULTS
// =============================================================================

/// Importance assigned on insert when the caller does not provide one.
pub const DEFAULT_IMPORTANCE_SCORE: f64 = 0.5;

// =============================================================================
// DECAY TASK
// Used by decay.rs; batch size is also a run_decay_cycle API parameter.
// =============================================================================

/// Default page/delete batch size for a decay cycle.
pub const DECAY_DEFAULT_BATCH_SIZE: usize = 500;

/// Maximum `{id, reason}` samples reported per kind in a decay report.
pub const DECAY_SAMPLE_LIMIT: usize = 20;

// =============================================================================
// COUNTER UPDATE PROTOCOL
// Conditional update retried on lost-update conflict; after the retries are
// exhausted the increment is merged unconditionally (one extra access is the
// accepted worst case).
// =============================================================================

/// Conditional counter-update retries before falling back to an
/// unconditional merge.
pub const COUNTER_UPDATE_RETRIES: u32 = 1;

// =============================================================================
// EMBEDDINGS
// =============================================================================

/// Default maximum embedding dimension (`D_max`). Vectors are padded or
/// truncated to the configured dimension on write; MiniLM-class encoders
/// produce 384-dim vectors.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

// =============================================================================
// ADMIN DISTRIBUTION BUCKETS
// Used by store/admin.rs histogram views.
// =============================================================================

/// Number of equal-width importance buckets over `[0, 1]`.
pub const IMPORTANCE_BUCKETS: usize = 10;

/// Access-count bucket lower edges (powers of two; last bucket is open-ended).
pub const ACCESS_COUNT_BUCKET_EDGES: [i64; 8] = [0, 1, 2, 4, 8, 16, 32, 64];

/// Age bucket lower edges in days (last bucket is open-ended).
pub const AGE_BUCKET_EDGES: [f64; 6] = [0.0, 1.0, 7.0, 30.0, 90.0, 365.0];
