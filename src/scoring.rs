//! Hybrid temporal scoring engine
//!
//! Pure arithmetic that turns stored attributes (age, access history,
//! importance) into the scores used for ranking, rehearsal, and eviction.
//! No I/O, no clock reads: `now` is always a parameter, and every function
//! returns a value in `[0, 1]` for well-typed input.
//!
//! # The decay model
//!
//! Pure exponential decay produces a cliff: memories drop fast and then the
//! curve flattens far below usefulness. Human forgetting follows a power law
//! for long-term retention, so the decay factor blends both, weighted by the
//! item's own importance:
//!
//! ```text
//! decay = (1 - w) * e^(-lambda * t)  +  w * (1 + t)^(-alpha)
//! ```
//!
//! where `w` is the clamped importance and `t` the age in days. Low-importance
//! items forget on the exponential curve; high-importance items retain on the
//! power-law tail. The blend is continuous in `w`.
//!
//! On top of the decay sit two access-driven bonuses:
//!
//! ```text
//! recency   = e^(-halving_rate * days_since_access)      (0 if never accessed)
//! frequency = min(1, log2(access_count + 1) / scale)
//! temporal  = clamp(w * decay + rw * recency + fw * frequency, 0, 1)
//! ```
//!
//! # References
//!
//! - Wixted & Ebbesen (1991) "On the Form of Forgetting"
//! - Anderson & Schooler (1991) "Reflections of the Environment in Memory"

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TemporalConfig;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Anything the scoring engine can evaluate: a persisted memory item, or a
/// plain snapshot in tests.
pub trait TemporalRecord {
    fn created_at(&self) -> DateTime<Utc>;
    fn importance_score(&self) -> f64;
    fn access_count(&self) -> i64;
    fn last_accessed_at(&self) -> Option<DateTime<Utc>>;
}

/// Minimal owned record for evaluating the engine without a store row.
#[derive(Debug, Clone, Copy)]
pub struct TemporalSnapshot {
    pub created_at: DateTime<Utc>,
    pub importance_score: f64,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl TemporalRecord for TemporalSnapshot {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn importance_score(&self) -> f64 {
        self.importance_score
    }
    fn access_count(&self) -> i64 {
        self.access_count
    }
    fn last_accessed_at(&self) -> Option<DateTime<Utc>> {
        self.last_accessed_at
    }
}

/// Age of a record in fractional days, floored at zero for clock skew.
#[inline]
pub fn age_days(record: &impl TemporalRecord, now: DateTime<Utc>) -> f64 {
    let age_seconds = (now - record.created_at()).num_milliseconds() as f64 / 1000.0;
    (age_seconds / SECONDS_PER_DAY).max(0.0)
}

/// Hybrid decay factor in `[0, 1]`.
///
/// `importance = 0` is purely exponential, `importance = 1` purely power-law;
/// at age zero the factor is exactly 1 for any importance.
#[inline]
pub fn decay_factor(record: &impl TemporalRecord, config: &TemporalConfig, now: DateTime<Utc>) -> f64 {
    let t = age_days(record, now);
    let w = config.clamp_importance(record.importance_score());

    let exponential = (-config.decay_lambda * t).exp();
    let power_law = (1.0 + t).powf(-config.decay_alpha);

    let decay = (1.0 - w) * exponential + w * power_law;
    decay.clamp(0.0, 1.0)
}

/// Recency bonus in `[0, 1]`; zero for never-accessed records.
#[inline]
pub fn recency_bonus(record: &impl TemporalRecord, config: &TemporalConfig, now: DateTime<Utc>) -> f64 {
    let Some(last_access) = record.last_accessed_at() else {
        return 0.0;
    };

    let delta_seconds = (now - last_access).num_milliseconds() as f64 / 1000.0;
    let delta_days = (delta_seconds / SECONDS_PER_DAY).max(0.0);

    (-config.recency_halving_rate * delta_days)
        .exp()
        .clamp(0.0, 1.0)
}

/// Frequency score in `[0, 1]`: logarithmic in the access count, so the
/// marginal gain shrinks as the count grows. Exactly zero at zero accesses.
#[inline]
pub fn frequency_score(record: &impl TemporalRecord, config: &TemporalConfig) -> f64 {
    let access_count = record.access_count();
    if access_count <= 0 {
        return 0.0;
    }

    let raw = ((access_count + 1) as f64).log2() / config.frequency_scale;
    raw.min(1.0)
}

/// Overall temporal score in `[0, 1]`.
///
/// With temporal scoring disabled this collapses to the clamped importance
/// score, so ranking degrades to importance-only ordering.
#[inline]
pub fn temporal_score(record: &impl TemporalRecord, config: &TemporalConfig, now: DateTime<Utc>) -> f64 {
    let importance = config.clamp_importance(record.importance_score());
    if !config.enabled {
        return importance.clamp(0.0, 1.0);
    }

    let score = importance * decay_factor(record, config, now)
        + config.recency_weight * recency_bonus(record, config, now)
        + config.frequency_weight * frequency_score(record, config);

    score.clamp(0.0, 1.0)
}

/// Normalize a raw lexical (BM25) score to `[0, 1]`.
#[inline]
pub fn normalize_lexical(config: &TemporalConfig, raw_score: f64) -> f64 {
    (raw_score / config.relevance_normalization_scale).clamp(0.0, 1.0)
}

/// Normalize a cosine similarity to `[0, 1]`; negative similarity is treated
/// as no relevance.
#[inline]
pub fn normalize_cosine(similarity: f64) -> f64 {
    similarity.clamp(0.0, 1.0)
}

/// Combined retrieval score in `[0, 1]` with optional per-query weight
/// overrides.
#[inline]
pub fn combined_score(
    config: &TemporalConfig,
    relevance: f64,
    temporal: f64,
    weight_relevance: Option<f64>,
    weight_temporal: Option<f64>,
) -> f64 {
    let w_rel = weight_relevance.unwrap_or(config.retrieval_weight_relevance);
    let w_tmp = weight_temporal.unwrap_or(config.retrieval_weight_temporal);

    (w_rel * relevance + w_tmp * temporal).clamp(0.0, 1.0)
}

/// Whether a retrieved item qualifies for rehearsal (strengthening).
#[inline]
pub fn should_rehearse(config: &TemporalConfig, relevance: f64) -> bool {
    config.enabled && relevance >= config.rehearsal_threshold
}

/// Why an item was selected for eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    ExceededMaxAge,
    TemporalScoreBelowThreshold,
}

impl DeletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExceededMaxAge => "exceeded max age",
            Self::TemporalScoreBelowThreshold => "temporal score below threshold",
        }
    }
}

impl std::fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deletion predicate: age strictly over `max_age_days` wins first, then a
/// temporal score strictly under `deletion_threshold`. Items exactly at
/// either boundary are retained.
#[inline]
pub fn should_delete(
    record: &impl TemporalRecord,
    config: &TemporalConfig,
    now: DateTime<Utc>,
) -> Option<DeletionReason> {
    if !config.enabled {
        return None;
    }

    if age_days(record, now) > config.max_age_days {
        return Some(DeletionReason::ExceededMaxAge);
    }

    if temporal_score(record, config, now) < config.deletion_threshold {
        return Some(DeletionReason::TemporalScoreBelowThreshold);
    }

    None
}
