//! Retrieval pipeline
//!
//! Turns a query into a ranked result list: per-kind candidate gathering
//! (BM25, cosine, or recent-first fallback), union-merge by id, combined
//! scoring against the temporal engine, deterministic ranking, then access
//! tracking and rehearsal applied to the returned items only, all inside one
//! store transaction. Candidates that are scanned but not returned are never
//! touched.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::TemporalConfig;
use crate::constants::{
    CANDIDATE_POOL_FLOOR, CANDIDATE_POOL_MULTIPLIER, MAX_CANDIDATES_PER_KIND, MIN_LEXICAL_SCORE,
};
use crate::errors::{AppError, Result, ValidationErrorExt};
use crate::memory::{
    LastModified, MemoryItem, MemoryKind, Query, RetrievalResult, RetrievedItem,
};
use crate::metrics;
use crate::scoring;
use crate::store::counters::{self, CounterUpdate};
use crate::store::{search, MemoryStore};
use crate::validation;

/// External embedding provider. The core only consumes vectors; generation
/// lives outside the store.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, kind: MemoryKind) -> anyhow::Result<Vec<f32>>;
}

/// One merged candidate before scoring.
struct Candidate {
    item: MemoryItem,
    lexical_raw: Option<f64>,
    vector_similarity: Option<f32>,
}

pub struct RetrievalPipeline {
    store: Arc<MemoryStore>,
    config: Arc<TemporalConfig>,
    clock: Arc<dyn Clock>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl RetrievalPipeline {
    pub fn new(
        store: Arc<MemoryStore>,
        config: Arc<TemporalConfig>,
        clock: Arc<dyn Clock>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            embedder,
        }
    }

    /// Execute a retrieval. Ranked hits come back with their score breakdown;
    /// counter updates for the returned items commit atomically with the read.
    pub async fn retrieve(&self, query: Query) -> Result<RetrievalResult> {
        validation::validate_query(&query, self.store.embedding_dim())
            .map_validation_err("query")?;

        let _timer = metrics::Timer::new(metrics::RETRIEVE_DURATION.clone());
        let started = Instant::now();
        let now = self.clock.now();
        let tenant = query.tenant();
        let kinds = query.effective_kinds();
        let pool_size = candidate_pool_size(query.limit);

        let text = query
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let mut vector_unavailable = false;
        let mut candidates: HashMap<(MemoryKind, String), Candidate> = HashMap::new();

        let mut tx = self.store.begin().await?;

        for kind in kinds {
            if let Some(text) = text {
                let hits =
                    search::lexical_candidates(&mut tx, kind, &tenant, text, pool_size).await?;
                for hit in hits {
                    if hit.raw_score <= MIN_LEXICAL_SCORE {
                        continue;
                    }
                    let entry = candidates
                        .entry((kind, hit.item.id.clone()))
                        .or_insert(Candidate {
                            item: hit.item,
                            lexical_raw: None,
                            vector_similarity: None,
                        });
                    entry.lexical_raw = Some(
                        entry
                            .lexical_raw
                            .map_or(hit.raw_score, |r| r.max(hit.raw_score)),
                    );
                }
            }

            let vector = self
                .resolve_vector(&query, text, kind, &mut vector_unavailable)
                .await;
            if let Some(vector) = vector {
                let hits = search::vector_candidates(
                    &mut tx,
                    kind,
                    &tenant,
                    &vector,
                    self.store.embedding_dim(),
                    pool_size,
                )
                .await?;
                for hit in hits {
                    let entry = candidates
                        .entry((kind, hit.item.id.clone()))
                        .or_insert(Candidate {
                            item: hit.item,
                            lexical_raw: None,
                            vector_similarity: None,
                        });
                    entry.vector_similarity = Some(
                        entry
                            .vector_similarity
                            .map_or(hit.similarity, |s| s.max(hit.similarity)),
                    );
                }
            }

            // No match mode at all: fall back to recency.
            if text.is_none() && query.vector.is_none() {
                let items = search::recent_candidates(
                    &mut tx,
                    kind,
                    &tenant,
                    query.session_id.as_deref(),
                    pool_size,
                )
                .await?;
                for item in items {
                    candidates
                        .entry((kind, item.id.clone()))
                        .or_insert(Candidate {
                            item,
                            lexical_raw: None,
                            vector_similarity: None,
                        });
                }
            }
        }

        let scanned_candidates = candidates.len();

        // Score and rank the merged pool.
        let (weight_relevance, weight_temporal) = match &query.weights {
            Some(w) => (w.relevance, w.temporal),
            None => (None, None),
        };

        let mut scored: Vec<RetrievedItem> = candidates
            .into_values()
            .map(|candidate| {
                let lexical = candidate
                    .lexical_raw
                    .map(|raw| scoring::normalize_lexical(&self.config, raw))
                    .unwrap_or(0.0);
                let vector = candidate
                    .vector_similarity
                    .map(|sim| scoring::normalize_cosine(sim as f64))
                    .unwrap_or(0.0);
                let relevance = lexical.max(vector);

                let temporal = scoring::temporal_score(&candidate.item, &self.config, now);
                let combined = scoring::combined_score(
                    &self.config,
                    relevance,
                    temporal,
                    weight_relevance,
                    weight_temporal,
                );

                RetrievedItem {
                    age_days: scoring::age_days(&candidate.item, now),
                    relevance,
                    temporal,
                    combined,
                    was_rehearsed: false,
                    item: candidate.item,
                }
            })
            .collect();

        // Rank order: combined desc, relevance desc, created_at desc, id asc.
        scored.sort_by(|a, b| {
            b.combined
                .total_cmp(&a.combined)
                .then_with(|| b.relevance.total_cmp(&a.relevance))
                .then_with(|| b.item.created_at.cmp(&a.item.created_at))
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        scored.truncate(query.limit);

        // Side effects for returned items only, when temporal tracking is on.
        let mut updates: Vec<CounterUpdate> = Vec::new();
        if self.config.enabled {
            for hit in &mut scored {
                let rehearse = scoring::should_rehearse(&self.config, hit.relevance);
                updates.push(CounterUpdate {
                    kind: hit.item.kind(),
                    id: hit.item.id.clone(),
                    observed_access_count: hit.item.access_count,
                    rehearse,
                });
                hit.was_rehearsed = rehearse;
            }

            // Consistent lock order across concurrent retrievals.
            updates.sort_by(|a, b| a.id.cmp(&b.id));
            for update in &updates {
                counters::apply_access(&mut tx, &self.config, update, now).await?;
            }
        }

        match tx.commit().await {
            Ok(()) => {}
            Err(e) => {
                let err: AppError = e.into();
                if matches!(err, AppError::Conflict(_)) && self.config.enabled {
                    // Reads carry no side effects; re-apply the increments
                    // best-effort outside the failed transaction.
                    warn!(error = %err, "retrieval commit conflicted, merging counter updates");
                    self.merge_counters_best_effort(&updates, now).await;
                } else {
                    metrics::RETRIEVALS_TOTAL.with_label_values(&["error"]).inc();
                    return Err(err);
                }
            }
        }

        // Reflect the committed effects in the returned snapshots.
        for hit in &mut scored {
            if self.config.enabled {
                apply_effects_in_memory(hit, &self.config, now);
            }
        }

        metrics::RETRIEVALS_TOTAL.with_label_values(&["ok"]).inc();
        metrics::RETRIEVE_CANDIDATES.observe(scanned_candidates as f64);
        metrics::REHEARSALS_TOTAL
            .inc_by(scored.iter().filter(|h| h.was_rehearsed).count() as u64);

        debug!(
            returned = scored.len(),
            scanned = scanned_candidates,
            vector_unavailable,
            "retrieval complete"
        );

        Ok(RetrievalResult {
            items: scored,
            scanned_candidates,
            elapsed_ms: started.elapsed().as_millis() as u64,
            vector_unavailable,
        })
    }

    /// Vector to use for one kind: the caller-supplied vector wins; otherwise
    /// the external embedder is asked once per kind. A provider failure
    /// degrades the query to lexical-only.
    async fn resolve_vector(
        &self,
        query: &Query,
        text: Option<&str>,
        kind: MemoryKind,
        vector_unavailable: &mut bool,
    ) -> Option<Vec<f32>> {
        if let Some(vector) = &query.vector {
            return Some(vector.clone());
        }

        if *vector_unavailable {
            return None;
        }

        let (embedder, text) = match (&self.embedder, text) {
            (Some(embedder), Some(text)) => (embedder, text),
            _ => return None,
        };

        match embedder.embed(text, kind).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(kind = %kind, error = %e, "embedding provider unavailable, degrading to lexical");
                *vector_unavailable = true;
                None
            }
        }
    }

    async fn merge_counters_best_effort(
        &self,
        updates: &[CounterUpdate],
        now: chrono::DateTime<chrono::Utc>,
    ) {
        let mut conn = match self.store.pool().acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "could not acquire connection for best-effort counter merge");
                return;
            }
        };
        for update in updates {
            if let Err(e) = counters::apply_access(&mut conn, &self.config, update, now).await {
                warn!(id = %update.id, error = %e, "best-effort counter merge failed");
            }
        }
    }
}

/// Candidate pool size per kind for a given result limit.
fn candidate_pool_size(limit: usize) -> usize {
    MAX_CANDIDATES_PER_KIND.min((limit * CANDIDATE_POOL_MULTIPLIER).max(CANDIDATE_POOL_FLOOR))
}

/// Mirror the committed counter/rehearsal effects on the returned snapshot.
fn apply_effects_in_memory(
    hit: &mut RetrievedItem,
    config: &TemporalConfig,
    now: chrono::DateTime<chrono::Utc>,
) {
    hit.item.access_count += 1;
    hit.item.last_accessed_at = Some(now);
    if hit.was_rehearsed {
        hit.item.rehearsal_count += 1;
        hit.item.importance_score =
            (hit.item.importance_score + config.rehearsal_boost).min(config.max_importance);
        hit.item.last_modified = LastModified::new(now, LastModified::OP_REHEARSED);
    } else {
        hit.item.last_modified = LastModified::new(now, LastModified::OP_ACCESSED);
    }
}
