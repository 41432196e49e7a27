//! Read-only aggregate views for external dashboards
//!
//! Counts, forgettable counts grouped by reason, and field distributions.
//! Nothing here mutates the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use super::MemoryStore;
use crate::config::TemporalConfig;
use crate::constants::{ACCESS_COUNT_BUCKET_EDGES, AGE_BUCKET_EDGES, IMPORTANCE_BUCKETS};
use crate::errors::Result;
use crate::memory::{MemoryKind, TenantScope};
use crate::scoring::{self, DeletionReason, TemporalSnapshot};

/// Which stored attribute a distribution is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionField {
    ImportanceScore,
    AccessCount,
    AgeDays,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    /// Human-readable bucket label, e.g. "0.3-0.4" or "90-365d".
    pub label: String,
    pub lower: f64,
    /// None for the open-ended last bucket.
    pub upper: Option<f64>,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Histogram {
    pub kind: MemoryKind,
    pub field: DistributionField,
    pub total: u64,
    pub buckets: Vec<HistogramBucket>,
}

/// Forgettable items grouped by deletion reason.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ForgettableStats {
    pub total: u64,
    pub exceeded_max_age: u64,
    pub below_threshold: u64,
}

impl MemoryStore {
    /// Count items in a tenant scope, for one kind or across all.
    pub async fn count_items(
        &self,
        tenant: &TenantScope,
        kind: Option<MemoryKind>,
    ) -> Result<i64> {
        let mut total = 0i64;
        for kind in kinds_to_scan(kind) {
            let mut sql = format!("SELECT COUNT(*) AS n FROM {} WHERE 1 = 1", kind.table());
            super::push_tenant_filter(&mut sql, tenant, "");

            let mut query = sqlx::query(&sql).bind(&tenant.organization_id);
            if let Some(user_id) = &tenant.user_id {
                query = query.bind(user_id);
            }

            let row = query.fetch_one(self.pool()).await?;
            total += row.try_get::<i64, _>("n")?;
        }
        Ok(total)
    }

    /// Count items currently satisfying the deletion predicate, grouped by
    /// reason. Evaluates the predicate against one `now` for the whole scan.
    pub async fn forgettable_count(
        &self,
        config: &TemporalConfig,
        tenant: &TenantScope,
        kind: Option<MemoryKind>,
        now: DateTime<Utc>,
    ) -> Result<ForgettableStats> {
        let mut stats = ForgettableStats::default();
        for kind in kinds_to_scan(kind) {
            for snapshot in self.temporal_snapshots(tenant, kind).await? {
                match scoring::should_delete(&snapshot, config, now) {
                    Some(DeletionReason::ExceededMaxAge) => {
                        stats.total += 1;
                        stats.exceeded_max_age += 1;
                    }
                    Some(DeletionReason::TemporalScoreBelowThreshold) => {
                        stats.total += 1;
                        stats.below_threshold += 1;
                    }
                    None => {}
                }
            }
        }
        Ok(stats)
    }

    /// Distribution of a stored attribute over one kind's tenant rows.
    pub async fn distribution(
        &self,
        tenant: &TenantScope,
        kind: MemoryKind,
        field: DistributionField,
        now: DateTime<Utc>,
    ) -> Result<Histogram> {
        let snapshots = self.temporal_snapshots(tenant, kind).await?;
        let mut buckets = make_buckets(field);
        let mut total = 0u64;

        for snapshot in &snapshots {
            let value = match field {
                DistributionField::ImportanceScore => snapshot.importance_score,
                DistributionField::AccessCount => snapshot.access_count as f64,
                DistributionField::AgeDays => scoring::age_days(snapshot, now),
            };
            if let Some(bucket) = buckets.iter_mut().rev().find(|b| value >= b.lower) {
                bucket.count += 1;
                total += 1;
            }
        }

        Ok(Histogram {
            kind,
            field,
            total,
            buckets,
        })
    }

    /// Load only the temporal columns of a kind's tenant rows.
    async fn temporal_snapshots(
        &self,
        tenant: &TenantScope,
        kind: MemoryKind,
    ) -> Result<Vec<TemporalSnapshot>> {
        let mut sql = format!(
            "SELECT created_at, importance_score, access_count, last_accessed_at \
             FROM {} WHERE 1 = 1",
            kind.table()
        );
        super::push_tenant_filter(&mut sql, tenant, "");

        let mut query = sqlx::query(&sql).bind(&tenant.organization_id);
        if let Some(user_id) = &tenant.user_id {
            query = query.bind(user_id);
        }

        let rows = query.fetch_all(self.pool()).await?;
        let mut snapshots = Vec::with_capacity(rows.len());
        for row in &rows {
            snapshots.push(TemporalSnapshot {
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                importance_score: row.try_get("importance_score")?,
                access_count: row.try_get("access_count")?,
                last_accessed_at: row.try_get::<Option<DateTime<Utc>>, _>("last_accessed_at")?,
            });
        }
        Ok(snapshots)
    }
}

fn kinds_to_scan(kind: Option<MemoryKind>) -> Vec<MemoryKind> {
    match kind {
        Some(kind) => vec![kind],
        None => MemoryKind::ALL.to_vec(),
    }
}

fn make_buckets(field: DistributionField) -> Vec<HistogramBucket> {
    match field {
        DistributionField::ImportanceScore => (0..IMPORTANCE_BUCKETS)
            .map(|i| {
                let lower = i as f64 / IMPORTANCE_BUCKETS as f64;
                let upper = (i + 1) as f64 / IMPORTANCE_BUCKETS as f64;
                HistogramBucket {
                    label: format!("{lower:.1}-{upper:.1}"),
                    lower,
                    // Importance is clamped to [0, 1]; the top bucket absorbs 1.0.
                    upper: if i + 1 == IMPORTANCE_BUCKETS {
                        None
                    } else {
                        Some(upper)
                    },
                    count: 0,
                }
            })
            .collect(),
        DistributionField::AccessCount => {
            let edges = ACCESS_COUNT_BUCKET_EDGES;
            edges
                .iter()
                .enumerate()
                .map(|(i, &lower)| {
                    let upper = edges.get(i + 1).map(|&u| u as f64);
                    let label = match upper {
                        Some(u) if (u as i64) == lower + 1 => format!("{lower}"),
                        Some(u) => format!("{lower}-{}", u as i64 - 1),
                        None => format!("{lower}+"),
                    };
                    HistogramBucket {
                        label,
                        lower: lower as f64,
                        upper,
                        count: 0,
                    }
                })
                .collect()
        }
        DistributionField::AgeDays => {
            let edges = AGE_BUCKET_EDGES;
            edges
                .iter()
                .enumerate()
                .map(|(i, &lower)| {
                    let upper = edges.get(i + 1).copied();
                    let label = match upper {
                        Some(u) => format!("{}-{}d", lower as i64, u as i64),
                        None => format!("{}d+", lower as i64),
                    };
                    HistogramBucket {
                        label,
                        lower,
                        upper,
                        count: 0,
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_buckets() {
        let buckets = make_buckets(DistributionField::ImportanceScore);
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[0].label, "0.0-0.1");
        assert!(buckets[9].upper.is_none());
    }

    #[test]
    fn test_access_count_bucket_labels() {
        let buckets = make_buckets(DistributionField::AccessCount);
        assert_eq!(buckets[0].label, "0");
        assert_eq!(buckets[1].label, "1");
        assert_eq!(buckets[2].label, "2-3");
        assert_eq!(buckets.last().unwrap().label, "64+");
    }

    #[test]
    fn test_age_bucket_labels() {
        let buckets = make_buckets(DistributionField::AgeDays);
        assert_eq!(buckets[0].label, "0-1d");
        assert_eq!(buckets.last().unwrap().label, "365d+");
    }
}
