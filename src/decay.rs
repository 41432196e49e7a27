//! Decay maintenance task
//!
//! Walks one tenant's items kind by kind, oldest first, evaluating the
//! deletion predicate against a single `now` captured when the cycle starts,
//! then deletes the plan in per-batch transactions. A failed batch is
//! reported and skipped; earlier batches stay committed. Dry-run returns the
//! plan without writing anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::TemporalConfig;
use crate::constants::{DECAY_DEFAULT_BATCH_SIZE, DECAY_SAMPLE_LIMIT};
use crate::errors::{AppError, Result};
use crate::memory::{MemoryKind, TenantScope};
use crate::metrics;
use crate::scoring::{self, DeletionReason};
use crate::store::{search, MemoryStore};
use crate::validation;

/// One decay cycle request.
#[derive(Debug, Clone, Deserialize)]
pub struct DecayRequest {
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DECAY_DEFAULT_BATCH_SIZE
}

/// Sampled deletion decision for the report.
#[derive(Debug, Clone, Serialize)]
pub struct DecaySample {
    pub id: String,
    pub reason: DeletionReason,
}

/// Per-kind statistics for one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct KindDecayStats {
    pub kind: MemoryKind,
    pub scanned: u64,
    pub to_delete: u64,
    pub deleted: u64,
    /// Rows in batches whose delete transaction failed.
    pub errors: u64,
    pub samples: Vec<DecaySample>,
}

/// Report for one decay cycle. Per-batch errors are carried here rather than
/// failing the cycle; earlier batches remain committed.
#[derive(Debug, Clone, Serialize)]
pub struct DecayReport {
    pub organization_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub kinds: Vec<KindDecayStats>,
}

impl DecayReport {
    pub fn total_deleted(&self) -> u64 {
        self.kinds.iter().map(|k| k.deleted).sum()
    }

    pub fn total_to_delete(&self) -> u64 {
        self.kinds.iter().map(|k| k.to_delete).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.kinds.iter().map(|k| k.errors).sum()
    }
}

/// Background eviction of forgettable items.
pub struct DecayTask {
    store: Arc<MemoryStore>,
    config: Arc<TemporalConfig>,
    clock: Arc<dyn Clock>,
}

impl DecayTask {
    pub fn new(store: Arc<MemoryStore>, config: Arc<TemporalConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Run one decay cycle for a tenant. Safe to run while retrieval is live:
    /// deletes happen in per-batch transactions and a locked batch is skipped
    /// for this cycle rather than retried.
    pub async fn run_cycle(&self, request: DecayRequest) -> Result<DecayReport> {
        validation::validate_tenant_id("organization_id", &request.organization_id)
            .map_err(|e| AppError::invalid_query("organization_id", e.to_string()))?;
        if let Some(user_id) = &request.user_id {
            validation::validate_tenant_id("user_id", user_id)
                .map_err(|e| AppError::invalid_query("user_id", e.to_string()))?;
        }
        if request.batch_size == 0 {
            return Err(AppError::invalid_query("batch_size", "must be >= 1"));
        }

        let tenant = TenantScope {
            organization_id: request.organization_id.clone(),
            user_id: request.user_id.clone(),
        };

        // One `now` for the whole cycle so a long-running task cannot race
        // ahead of its own decisions.
        let now = self.clock.now();
        let started = Instant::now();

        if !self.config.enabled {
            info!("temporal scoring disabled, skipping decay cycle");
            return Ok(DecayReport {
                organization_id: request.organization_id,
                user_id: request.user_id,
                dry_run: request.dry_run,
                started_at: now,
                elapsed_ms: started.elapsed().as_millis() as u64,
                kinds: Vec::new(),
            });
        }

        info!(
            organization_id = %tenant.organization_id,
            user_id = tenant.user_id.as_deref().unwrap_or("-"),
            dry_run = request.dry_run,
            "starting decay cycle"
        );

        let mut kinds = Vec::with_capacity(MemoryKind::ALL.len());
        for kind in MemoryKind::ALL {
            let stats = self
                .process_kind(kind, &tenant, now, request.dry_run, request.batch_size)
                .await?;
            if stats.to_delete > 0 {
                info!(
                    kind = %kind,
                    scanned = stats.scanned,
                    to_delete = stats.to_delete,
                    deleted = stats.deleted,
                    errors = stats.errors,
                    "decay cycle kind complete"
                );
            }
            kinds.push(stats);
        }

        let report = DecayReport {
            organization_id: request.organization_id,
            user_id: request.user_id,
            dry_run: request.dry_run,
            started_at: now,
            elapsed_ms: started.elapsed().as_millis() as u64,
            kinds,
        };

        metrics::DECAY_CYCLES_TOTAL
            .with_label_values(&[if report.dry_run { "dry_run" } else { "live" }])
            .inc();

        info!(
            deleted = report.total_deleted(),
            planned = report.total_to_delete(),
            errors = report.total_errors(),
            elapsed_ms = report.elapsed_ms,
            "decay cycle complete"
        );

        Ok(report)
    }

    async fn process_kind(
        &self,
        kind: MemoryKind,
        tenant: &TenantScope,
        now: DateTime<Utc>,
        dry_run: bool,
        batch_size: usize,
    ) -> Result<KindDecayStats> {
        let mut stats = KindDecayStats {
            kind,
            scanned: 0,
            to_delete: 0,
            deleted: 0,
            errors: 0,
            samples: Vec::new(),
        };

        // Scan phase: page oldest-first and collect the deletion plan.
        let mut plan: Vec<String> = Vec::new();
        let mut cursor: Option<(DateTime<Utc>, String)> = None;
        loop {
            let mut conn = self.store.pool().acquire().await?;
            let page =
                search::page_oldest_first(&mut conn, kind, tenant, cursor.clone(), batch_size)
                    .await?;
            drop(conn);
            if page.is_empty() {
                break;
            }
            cursor = page
                .last()
                .map(|item| (item.created_at, item.id.clone()));

            for item in page {
                stats.scanned += 1;
                if let Some(reason) = scoring::should_delete(&item, &self.config, now) {
                    stats.to_delete += 1;
                    if stats.samples.len() < DECAY_SAMPLE_LIMIT {
                        stats.samples.push(DecaySample {
                            id: item.id.clone(),
                            reason,
                        });
                    }
                    metrics::DECAY_SELECTED_TOTAL
                        .with_label_values(&[kind.as_str(), reason.as_str()])
                        .inc();
                    plan.push(item.id);
                }
            }
        }

        if dry_run {
            return Ok(stats);
        }

        // Delete phase: per-batch transactions; a failed batch does not roll
        // back previously committed ones.
        for batch in plan.chunks(batch_size) {
            match self.store.delete_batch(kind, batch).await {
                Ok(deleted) => {
                    stats.deleted += deleted;
                    metrics::DECAY_DELETED_TOTAL
                        .with_label_values(&[kind.as_str()])
                        .inc_by(deleted);
                }
                Err(e) => {
                    warn!(kind = %kind, batch = batch.len(), error = %e, "decay batch failed, continuing");
                    stats.errors += batch.len() as u64;
                }
            }
        }

        Ok(stats)
    }
}
