//! Counter update protocol for the retrieval pipeline
//!
//! Every returned item gets `access_count + 1` and a fresh `last_accessed_at`
//! in the retrieval transaction; items retrieved with high relevance also get
//! the rehearsal effect (importance boost, `rehearsal_count + 1`) atomically
//! with the access bump.
//!
//! The update is conditional on the access count observed when the candidate
//! row was read (`WHERE access_count = :observed`) and retried once after
//! re-reading; if the retry also loses, the increment is merged
//! unconditionally, accepting one extra access as the worst case.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use tracing::warn;

use crate::config::TemporalConfig;
use crate::constants::COUNTER_UPDATE_RETRIES;
use crate::errors::Result;
use crate::memory::{LastModified, MemoryKind};

/// One pending counter update for a returned item.
#[derive(Debug, Clone)]
pub struct CounterUpdate {
    pub kind: MemoryKind,
    pub id: String,
    /// `access_count` observed when the candidate row was read.
    pub observed_access_count: i64,
    /// Apply the rehearsal effect together with the access bump.
    pub rehearse: bool,
}

/// Apply an access (and optional rehearsal) to one row. Returns false if the
/// row disappeared underneath the retrieval (deleted concurrently).
pub async fn apply_access(
    conn: &mut SqliteConnection,
    config: &TemporalConfig,
    update: &CounterUpdate,
    now: DateTime<Utc>,
) -> Result<bool> {
    let mut observed = update.observed_access_count;

    for _ in 0..=COUNTER_UPDATE_RETRIES {
        let affected = conditional_update(conn, config, update, observed, now).await?;
        if affected > 0 {
            return Ok(true);
        }

        // Lost the conditional write; re-read and try once more.
        let sql = format!(
            "SELECT access_count FROM {} WHERE id = ?",
            update.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(&update.id)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => observed = row.try_get("access_count")?,
            None => return Ok(false),
        }
    }

    // Retry budget exhausted: merge the increment unconditionally. One access
    // may be double-counted in the worst case.
    warn!(
        id = %update.id,
        kind = %update.kind,
        "access counter conflict persisted after retry, merging non-transactionally"
    );
    let affected = unconditional_update(conn, config, update, now).await?;
    Ok(affected > 0)
}

async fn conditional_update(
    conn: &mut SqliteConnection,
    config: &TemporalConfig,
    update: &CounterUpdate,
    observed: i64,
    now: DateTime<Utc>,
) -> Result<u64> {
    let table = update.kind.table();
    let result = if update.rehearse {
        let sql = format!(
            "UPDATE {table} SET access_count = access_count + 1, last_accessed_at = ?, \
             rehearsal_count = rehearsal_count + 1, \
             importance_score = min(?, importance_score + ?), \
             last_modified_at = ?, last_modified_op = ? \
             WHERE id = ? AND access_count = ?"
        );
        sqlx::query(&sql)
            .bind(now)
            .bind(config.max_importance)
            .bind(config.rehearsal_boost)
            .bind(now)
            .bind(LastModified::OP_REHEARSED)
            .bind(&update.id)
            .bind(observed)
            .execute(&mut *conn)
            .await?
    } else {
        let sql = format!(
            "UPDATE {table} SET access_count = access_count + 1, last_accessed_at = ?, \
             last_modified_at = ?, last_modified_op = ? \
             WHERE id = ? AND access_count = ?"
        );
        sqlx::query(&sql)
            .bind(now)
            .bind(now)
            .bind(LastModified::OP_ACCESSED)
            .bind(&update.id)
            .bind(observed)
            .execute(&mut *conn)
            .await?
    };
    Ok(result.rows_affected())
}

async fn unconditional_update(
    conn: &mut SqliteConnection,
    config: &TemporalConfig,
    update: &CounterUpdate,
    now: DateTime<Utc>,
) -> Result<u64> {
    let table = update.kind.table();
    let result = if update.rehearse {
        let sql = format!(
            "UPDATE {table} SET access_count = access_count + 1, last_accessed_at = ?, \
             rehearsal_count = rehearsal_count + 1, \
             importance_score = min(?, importance_score + ?), \
             last_modified_at = ?, last_modified_op = ? \
             WHERE id = ?"
        );
        sqlx::query(&sql)
            .bind(now)
            .bind(config.max_importance)
            .bind(config.rehearsal_boost)
            .bind(now)
            .bind(LastModified::OP_REHEARSED)
            .bind(&update.id)
            .execute(&mut *conn)
            .await?
    } else {
        let sql = format!(
            "UPDATE {table} SET access_count = access_count + 1, last_accessed_at = ?, \
             last_modified_at = ?, last_modified_op = ? \
             WHERE id = ?"
        );
        sqlx::query(&sql)
            .bind(now)
            .bind(now)
            .bind(LastModified::OP_ACCESSED)
            .bind(&update.id)
            .execute(&mut *conn)
            .await?
    };
    Ok(result.rows_affected())
}
