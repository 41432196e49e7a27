//! Write API: create, update, delete
//!
//! Counters (`access_count`, `rehearsal_count`) and `last_accessed_at` are not
//! writable through this surface; they belong to the retrieval pipeline and
//! the decay task. The patch type simply has no such fields.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteQueryResult;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::{embedding_to_blob, fetch_by_id, MemoryStore};
use crate::config::TemporalConfig;
use crate::constants::DEFAULT_IMPORTANCE_SCORE;
use crate::errors::{AppError, Result};
use crate::memory::{LastModified, MemoryContent, MemoryItem, MemoryKind, TenantScope};
use crate::validation;

/// Request to insert a new memory item.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub tenant: TenantScope,
    pub content: MemoryContent,
    /// Defaults to 0.5; clamped into the configured importance range.
    #[serde(default)]
    pub importance_score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    /// Logical birth time for chat and episodic items (message timestamp /
    /// event occurrence time). Ignored for the other kinds, which always use
    /// the insertion time.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Partial update of content, importance, or metadata. Tenant fields, id,
/// and counters cannot be patched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePatch {
    #[serde(default)]
    pub content: Option<MemoryContent>,
    #[serde(default)]
    pub importance_score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

impl UpdatePatch {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.importance_score.is_none() && self.metadata.is_none()
    }
}

impl MemoryStore {
    /// Insert a new item. Assigns the id, clamps importance, initializes the
    /// counters to zero and `last_accessed_at` to null.
    pub async fn create(
        &self,
        config: &TemporalConfig,
        request: CreateRequest,
        now: DateTime<Utc>,
    ) -> Result<MemoryItem> {
        validate_tenant(&request.tenant)?;
        validation::validate_content(&request.content, self.embedding_dim())
            .map_err(|e| AppError::InvariantViolation(e.to_string()))?;

        let importance = request.importance_score.unwrap_or(DEFAULT_IMPORTANCE_SCORE);
        validation::validate_importance(importance)
            .map_err(|e| AppError::InvariantViolation(e.to_string()))?;
        let importance = config.clamp_importance(importance);

        let metadata = request.metadata.unwrap_or_else(|| JsonValue::Object(Default::default()));
        validation::validate_metadata(&metadata)
            .map_err(|e| AppError::InvariantViolation(e.to_string()))?;

        let kind = request.content.kind();
        let created_at = match kind {
            MemoryKind::Chat | MemoryKind::Episodic => request.occurred_at.unwrap_or(now),
            _ => now,
        };

        let item = MemoryItem {
            id: Uuid::new_v4().to_string(),
            tenant: request.tenant,
            created_at,
            importance_score: importance,
            access_count: 0,
            last_accessed_at: None,
            rehearsal_count: 0,
            metadata,
            last_modified: LastModified::new(now, LastModified::OP_CREATED),
            content: request.content,
        };

        let mut tx = self.begin().await?;
        insert_row(&mut tx, &item, self.embedding_dim()).await?;
        fts_insert(&mut tx, &item).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Patch an existing item. An empty patch only refreshes `last_modified`.
    ///
    /// Embedding fields omitted from a content patch are preserved from the
    /// stored row; regenerating stale vectors after a text change is the
    /// caller's responsibility.
    pub async fn update(
        &self,
        config: &TemporalConfig,
        tenant: &TenantScope,
        id: &str,
        patch: UpdatePatch,
        now: DateTime<Utc>,
    ) -> Result<MemoryItem> {
        validate_tenant(tenant)?;

        let mut tx = self.begin().await?;

        let mut existing = None;
        for kind in MemoryKind::ALL {
            if let Some(item) = fetch_by_id(&mut tx, kind, tenant, id).await? {
                existing = Some(item);
                break;
            }
        }
        let mut item = existing.ok_or_else(|| AppError::NotFound(id.to_string()))?;
        let kind = item.kind();

        if let Some(mut content) = patch.content {
            if content.kind() != kind {
                return Err(AppError::InvariantViolation(format!(
                    "content kind {} does not match stored kind {kind}",
                    content.kind()
                )));
            }
            validation::validate_content(&content, self.embedding_dim())
                .map_err(|e| AppError::InvariantViolation(e.to_string()))?;
            carry_over_embeddings(&mut content, &item.content);
            item.content = content;
        }

        if let Some(importance) = patch.importance_score {
            validation::validate_importance(importance)
                .map_err(|e| AppError::InvariantViolation(e.to_string()))?;
            item.importance_score = config.clamp_importance(importance);
        }

        if let Some(metadata) = patch.metadata {
            validation::validate_metadata(&metadata)
                .map_err(|e| AppError::InvariantViolation(e.to_string()))?;
            item.metadata = metadata;
        }

        item.last_modified = LastModified::new(now, LastModified::OP_UPDATED);

        update_row(&mut tx, &item, self.embedding_dim()).await?;
        fts_delete(&mut tx, kind, &item.id).await?;
        fts_insert(&mut tx, &item).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Hard delete. Returns whether a row was removed; deleting an absent id
    /// is a success (idempotent).
    pub async fn delete(&self, tenant: &TenantScope, id: &str) -> Result<bool> {
        validate_tenant(tenant)?;

        let mut tx = self.begin().await?;
        for kind in MemoryKind::ALL {
            let mut sql = format!("DELETE FROM {} WHERE id = ?", kind.table());
            super::push_tenant_filter(&mut sql, tenant, "");

            let mut query = sqlx::query(&sql).bind(id).bind(&tenant.organization_id);
            if let Some(user_id) = &tenant.user_id {
                query = query.bind(user_id);
            }

            let result: SqliteQueryResult = query.execute(&mut *tx).await?;
            if result.rows_affected() > 0 {
                fts_delete(&mut tx, kind, id).await?;
                tx.commit().await?;
                return Ok(true);
            }
        }
        tx.commit().await?;
        Ok(false)
    }

    /// Delete a batch of ids from one kind table in a single transaction.
    /// Used by the decay task; the batch commits or rolls back as a whole.
    pub(crate) async fn delete_batch(&self, kind: MemoryKind, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut tx = self.begin().await?;

        let sql = format!("DELETE FROM {} WHERE id IN ({placeholders})", kind.table());
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let deleted = query.execute(&mut *tx).await?.rows_affected();

        let sql = format!(
            "DELETE FROM {} WHERE id IN ({placeholders})",
            kind.fts_table()
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(deleted)
    }
}

fn validate_tenant(tenant: &TenantScope) -> Result<()> {
    validation::validate_tenant_id("organization_id", &tenant.organization_id)
        .map_err(|e| AppError::InvariantViolation(e.to_string()))?;
    if let Some(user_id) = &tenant.user_id {
        validation::validate_tenant_id("user_id", user_id)
            .map_err(|e| AppError::InvariantViolation(e.to_string()))?;
    }
    Ok(())
}

/// Fill embedding fields the patch left empty from the stored content.
fn carry_over_embeddings(new: &mut MemoryContent, old: &MemoryContent) {
    match (new, old) {
        (MemoryContent::Chat(n), MemoryContent::Chat(o)) => {
            if n.content_embedding.is_none() {
                n.content_embedding = o.content_embedding.clone();
            }
        }
        (MemoryContent::Episodic(n), MemoryContent::Episodic(o)) => {
            if n.summary_embedding.is_none() {
                n.summary_embedding = o.summary_embedding.clone();
            }
            if n.details_embedding.is_none() {
                n.details_embedding = o.details_embedding.clone();
            }
        }
        (MemoryContent::Semantic(n), MemoryContent::Semantic(o)) => {
            if n.summary_embedding.is_none() {
                n.summary_embedding = o.summary_embedding.clone();
            }
            if n.details_embedding.is_none() {
                n.details_embedding = o.details_embedding.clone();
            }
        }
        (MemoryContent::Procedural(n), MemoryContent::Procedural(o)) => {
            if n.description_embedding.is_none() {
                n.description_embedding = o.description_embedding.clone();
            }
        }
        (MemoryContent::Resource(n), MemoryContent::Resource(o)) => {
            if n.description_embedding.is_none() {
                n.description_embedding = o.description_embedding.clone();
            }
        }
        (MemoryContent::KnowledgeVault(n), MemoryContent::KnowledgeVault(o)) => {
            if n.content_embedding.is_none() {
                n.content_embedding = o.content_embedding.clone();
            }
        }
        _ => {}
    }
}

async fn insert_row(
    conn: &mut SqliteConnection,
    item: &MemoryItem,
    dim: usize,
) -> Result<()> {
    let kind = item.kind();
    let content_cols = super::content_columns(kind);
    let content_placeholders = vec!["?"; content_cols.len()].join(", ");

    let sql = format!(
        "INSERT INTO {} (id, organization_id, user_id, created_at, importance_score, \
         access_count, last_accessed_at, rehearsal_count, metadata, last_modified_at, \
         last_modified_op, {}) VALUES (?, ?, ?, ?, ?, 0, NULL, 0, ?, ?, ?, {content_placeholders})",
        kind.table(),
        content_cols.join(", "),
    );

    let query = sqlx::query(&sql)
        .bind(&item.id)
        .bind(&item.tenant.organization_id)
        .bind(&item.tenant.user_id)
        .bind(item.created_at)
        .bind(item.importance_score)
        .bind(item.metadata.to_string())
        .bind(item.last_modified.timestamp)
        .bind(&item.last_modified.operation);

    bind_content(query, &item.content, dim)?.execute(conn).await?;
    Ok(())
}

async fn update_row(
    conn: &mut SqliteConnection,
    item: &MemoryItem,
    dim: usize,
) -> Result<()> {
    let kind = item.kind();
    let content_assignments = super::content_columns(kind)
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET importance_score = ?, metadata = ?, last_modified_at = ?, \
         last_modified_op = ?, {content_assignments} WHERE id = ?",
        kind.table(),
    );

    let query = sqlx::query(&sql)
        .bind(item.importance_score)
        .bind(item.metadata.to_string())
        .bind(item.last_modified.timestamp)
        .bind(&item.last_modified.operation);

    bind_content(query, &item.content, dim)?
        .bind(&item.id)
        .execute(conn)
        .await?;
    Ok(())
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Bind the kind-specific columns in the order of `content_columns`.
fn bind_content<'q>(
    query: SqliteQuery<'q>,
    content: &'q MemoryContent,
    dim: usize,
) -> Result<SqliteQuery<'q>> {
    let blob = |v: &Option<Vec<f32>>| v.as_ref().map(|e| embedding_to_blob(e, dim));
    let json_list = |v: &Vec<String>| -> Result<String> {
        serde_json::to_string(v).map_err(|e| AppError::Internal(e.into()))
    };

    let query = match content {
        MemoryContent::Chat(c) => query
            .bind(&c.session_id)
            .bind(c.role.as_str())
            .bind(&c.content)
            .bind(blob(&c.content_embedding)),
        MemoryContent::Episodic(c) => query
            .bind(&c.actor)
            .bind(&c.event_type)
            .bind(&c.summary)
            .bind(&c.details)
            .bind(json_list(&c.tree_path)?)
            .bind(blob(&c.summary_embedding))
            .bind(blob(&c.details_embedding)),
        MemoryContent::Semantic(c) => query
            .bind(&c.name)
            .bind(&c.summary)
            .bind(&c.details)
            .bind(&c.source)
            .bind(json_list(&c.tree_path)?)
            .bind(blob(&c.summary_embedding))
            .bind(blob(&c.details_embedding)),
        MemoryContent::Procedural(c) => query
            .bind(&c.skill_name)
            .bind(&c.description)
            .bind(json_list(&c.steps)?)
            .bind(blob(&c.description_embedding)),
        MemoryContent::Resource(c) => query
            .bind(&c.resource_name)
            .bind(&c.description)
            .bind(&c.resource_type)
            .bind(&c.location)
            .bind(blob(&c.description_embedding)),
        MemoryContent::KnowledgeVault(c) => query
            .bind(&c.title)
            .bind(&c.content)
            .bind(&c.vault_type)
            .bind(blob(&c.content_embedding)),
    };

    Ok(query)
}

/// Insert the lexical fields into the kind's FTS5 table.
async fn fts_insert(conn: &mut SqliteConnection, item: &MemoryItem) -> Result<()> {
    let kind = item.kind();
    match &item.content {
        MemoryContent::Chat(c) => {
            let sql = format!("INSERT INTO {} (id, content) VALUES (?, ?)", kind.fts_table());
            sqlx::query(&sql)
                .bind(&item.id)
                .bind(&c.content)
                .execute(conn)
                .await?;
        }
        MemoryContent::Episodic(c) => {
            let sql = format!(
                "INSERT INTO {} (id, summary, details) VALUES (?, ?, ?)",
                kind.fts_table()
            );
            sqlx::query(&sql)
                .bind(&item.id)
                .bind(&c.summary)
                .bind(&c.details)
                .execute(conn)
                .await?;
        }
        MemoryContent::Semantic(c) => {
            let sql = format!(
                "INSERT INTO {} (id, summary, details) VALUES (?, ?, ?)",
                kind.fts_table()
            );
            sqlx::query(&sql)
                .bind(&item.id)
                .bind(&c.summary)
                .bind(&c.details)
                .execute(conn)
                .await?;
        }
        MemoryContent::Procedural(c) => {
            let sql = format!(
                "INSERT INTO {} (id, description) VALUES (?, ?)",
                kind.fts_table()
            );
            sqlx::query(&sql)
                .bind(&item.id)
                .bind(&c.description)
                .execute(conn)
                .await?;
        }
        MemoryContent::Resource(c) => {
            let sql = format!(
                "INSERT INTO {} (id, description) VALUES (?, ?)",
                kind.fts_table()
            );
            sqlx::query(&sql)
                .bind(&item.id)
                .bind(&c.description)
                .execute(conn)
                .await?;
        }
        MemoryContent::KnowledgeVault(c) => {
            let sql = format!("INSERT INTO {} (id, content) VALUES (?, ?)", kind.fts_table());
            sqlx::query(&sql)
                .bind(&item.id)
                .bind(&c.content)
                .execute(conn)
                .await?;
        }
    }
    Ok(())
}

async fn fts_delete(conn: &mut SqliteConnection, kind: MemoryKind, id: &str) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?", kind.fts_table());
    sqlx::query(&sql).bind(id).execute(conn).await?;
    Ok(())
}
