//! Candidate queries for the retrieval pipeline
//!
//! Three ways into a kind table, all tenant-scoped: BM25 over the FTS5
//! companion table, a cosine scan over stored embeddings, and recent-first
//! by `created_at`. Time-range and keyset-paged reads support the list API
//! and the decay task.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use sqlx::{Row, SqliteConnection};

use super::{
    blob_to_embedding, decode_item, embedding_columns, pad_embedding, push_tenant_filter,
    select_columns,
};
use crate::errors::Result;
use crate::memory::{MemoryItem, MemoryKind, TenantScope};
use crate::similarity::cosine_similarity;

/// A lexical candidate with its raw (un-normalized) BM25 score.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub item: MemoryItem,
    pub raw_score: f64,
}

/// A vector candidate with its cosine similarity in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub item: MemoryItem,
    pub similarity: f32,
}

/// Escape free text into an FTS5 MATCH expression: each whitespace token
/// becomes a quoted phrase so query operators in user input stay inert.
pub(crate) fn fts_match_expr(text: &str) -> String {
    text.split_whitespace()
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Top-N lexical candidates for a kind by BM25.
///
/// SQLite's `bm25()` ranks best matches most negative, so the sign is flipped
/// to yield the conventional higher-is-better raw score.
pub async fn lexical_candidates(
    conn: &mut SqliteConnection,
    kind: MemoryKind,
    tenant: &TenantScope,
    text: &str,
    limit: usize,
) -> Result<Vec<LexicalHit>> {
    let match_expr = fts_match_expr(text);
    if match_expr.is_empty() {
        return Ok(Vec::new());
    }

    let fts = kind.fts_table();
    let mut sql = format!(
        "SELECT {}, -bm25({fts}) AS lexical_score FROM {fts} \
         JOIN {} m ON m.id = {fts}.id WHERE {fts} MATCH ?",
        select_columns(kind, Some("m")),
        kind.table(),
    );
    push_tenant_filter(&mut sql, tenant, "m.");
    sql.push_str(" ORDER BY lexical_score DESC, m.id ASC LIMIT ?");

    let mut query = sqlx::query(&sql)
        .bind(match_expr)
        .bind(&tenant.organization_id);
    if let Some(user_id) = &tenant.user_id {
        query = query.bind(user_id);
    }
    query = query.bind(limit as i64);

    let rows = query.fetch_all(&mut *conn).await?;
    let mut hits = Vec::with_capacity(rows.len());
    for row in &rows {
        hits.push(LexicalHit {
            item: decode_item(kind, row)?,
            raw_score: row.try_get("lexical_score")?,
        });
    }
    Ok(hits)
}

/// Top-N vector candidates for a kind by cosine similarity.
///
/// Scans the tenant's rows that carry at least one embedding and ranks them
/// in process; an approximate index can replace this scan without changing
/// the contract. For kinds with two embedding columns the better of the two
/// similarities counts. Non-positive similarities are dropped.
pub async fn vector_candidates(
    conn: &mut SqliteConnection,
    kind: MemoryKind,
    tenant: &TenantScope,
    vector: &[f32],
    dim: usize,
    limit: usize,
) -> Result<Vec<VectorHit>> {
    let query_vector = pad_embedding(vector, dim);

    let not_null = embedding_columns(kind)
        .iter()
        .map(|column| format!("{column} IS NOT NULL"))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut sql = format!(
        "SELECT {} FROM {} WHERE ({not_null})",
        select_columns(kind, None),
        kind.table(),
    );
    push_tenant_filter(&mut sql, tenant, "");

    let mut query = sqlx::query(&sql).bind(&tenant.organization_id);
    if let Some(user_id) = &tenant.user_id {
        query = query.bind(user_id);
    }

    let rows = query.fetch_all(&mut *conn).await?;
    let mut hits: Vec<VectorHit> = Vec::new();
    for row in &rows {
        let mut best: Option<f32> = None;
        for column in embedding_columns(kind) {
            let blob: Option<Vec<u8>> = row.try_get(*column)?;
            if let Some(blob) = blob {
                let stored = blob_to_embedding(&blob);
                let similarity = cosine_similarity(&query_vector, &stored);
                best = Some(best.map_or(similarity, |b| b.max(similarity)));
            }
        }
        if let Some(similarity) = best {
            if similarity > 0.0 {
                hits.push(VectorHit {
                    item: decode_item(kind, row)?,
                    similarity,
                });
            }
        }
    }

    hits.sort_by(|a, b| {
        OrderedFloat(b.similarity)
            .cmp(&OrderedFloat(a.similarity))
            .then_with(|| a.item.id.cmp(&b.item.id))
    });
    hits.truncate(limit);
    Ok(hits)
}

/// Most recent candidates for a kind by `created_at`. For the chat kind an
/// optional session id narrows the window to one conversation.
pub async fn recent_candidates(
    conn: &mut SqliteConnection,
    kind: MemoryKind,
    tenant: &TenantScope,
    session_id: Option<&str>,
    limit: usize,
) -> Result<Vec<MemoryItem>> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE 1 = 1",
        select_columns(kind, None),
        kind.table(),
    );
    push_tenant_filter(&mut sql, tenant, "");
    let with_session = kind == MemoryKind::Chat && session_id.is_some();
    if with_session {
        sql.push_str(" AND session_id = ?");
    }
    sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ?");

    let mut query = sqlx::query(&sql).bind(&tenant.organization_id);
    if let Some(user_id) = &tenant.user_id {
        query = query.bind(user_id);
    }
    if with_session {
        query = query.bind(session_id.unwrap());
    }
    query = query.bind(limit as i64);

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(|row| decode_item(kind, row)).collect()
}

/// Items of a kind created within `[start, end)`, newest first.
pub async fn items_in_time_range(
    conn: &mut SqliteConnection,
    kind: MemoryKind,
    tenant: &TenantScope,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<MemoryItem>> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE created_at >= ? AND created_at < ?",
        select_columns(kind, None),
        kind.table(),
    );
    push_tenant_filter(&mut sql, tenant, "");
    sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ?");

    let mut query = sqlx::query(&sql).bind(start).bind(end).bind(&tenant.organization_id);
    if let Some(user_id) = &tenant.user_id {
        query = query.bind(user_id);
    }
    query = query.bind(limit as i64);

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(|row| decode_item(kind, row)).collect()
}

/// One keyset page of a kind's rows, oldest first. `after` is the
/// `(created_at, id)` cursor of the previous page's last row, so deletes
/// between pages cannot skip rows the way OFFSET paging would.
pub async fn page_oldest_first(
    conn: &mut SqliteConnection,
    kind: MemoryKind,
    tenant: &TenantScope,
    after: Option<(DateTime<Utc>, String)>,
    batch_size: usize,
) -> Result<Vec<MemoryItem>> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE 1 = 1",
        select_columns(kind, None),
        kind.table(),
    );
    push_tenant_filter(&mut sql, tenant, "");
    if after.is_some() {
        sql.push_str(" AND (created_at > ? OR (created_at = ? AND id > ?))");
    }
    sql.push_str(" ORDER BY created_at ASC, id ASC LIMIT ?");

    let mut query = sqlx::query(&sql).bind(&tenant.organization_id);
    if let Some(user_id) = &tenant.user_id {
        query = query.bind(user_id);
    }
    if let Some((created_at, id)) = &after {
        query = query.bind(created_at).bind(created_at).bind(id);
    }
    query = query.bind(batch_size as i64);

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(|row| decode_item(kind, row)).collect()
}
