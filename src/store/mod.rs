//! Persistent store for memory items
//!
//! SQLite via sqlx: one table per memory kind carrying the shared temporal
//! envelope plus kind-specific content columns, an FTS5 companion table per
//! kind for BM25 lexical search, and embeddings as f32 little-endian blobs
//! padded to the configured dimension `D_max`.
//!
//! All reads and deletes are tenant-scoped. Invariants are enforced at write
//! time; counter updates go through the conditional-update protocol in
//! `counters`.

pub mod admin;
pub mod counters;
pub mod search;
pub mod write;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, Transaction};
use std::str::FromStr;
use tracing::info;

use crate::config::ServerConfig;
use crate::errors::{AppError, Result};
use crate::memory::{
    ChatContent, ChatRole, EpisodicContent, LastModified, MemoryContent, MemoryItem, MemoryKind,
    ProceduralContent, ResourceContent, SemanticContent, TenantScope, VaultContent,
};

/// Columns shared by every kind table, in decode order.
const COMMON_COLUMNS: &str = "id, organization_id, user_id, created_at, importance_score, \
     access_count, last_accessed_at, rehearsal_count, metadata, last_modified_at, last_modified_op";

/// Kind-specific content columns, in decode order.
fn content_columns(kind: MemoryKind) -> &'static [&'static str] {
    match kind {
        MemoryKind::Chat => &["session_id", "role", "content", "content_embedding"],
        MemoryKind::Episodic => &[
            "actor",
            "event_type",
            "summary",
            "details",
            "tree_path",
            "summary_embedding",
            "details_embedding",
        ],
        MemoryKind::Semantic => &[
            "name",
            "summary",
            "details",
            "source",
            "tree_path",
            "summary_embedding",
            "details_embedding",
        ],
        MemoryKind::Procedural => &["skill_name", "description", "steps", "description_embedding"],
        MemoryKind::Resource => &[
            "resource_name",
            "description",
            "resource_type",
            "location",
            "description_embedding",
        ],
        MemoryKind::KnowledgeVault => &["title", "content", "vault_type", "content_embedding"],
    }
}

/// Full select list for a kind, optionally prefixed with a table alias.
pub(crate) fn select_columns(kind: MemoryKind, alias: Option<&str>) -> String {
    let mut all: Vec<String> = Vec::new();
    for column in COMMON_COLUMNS.split(", ") {
        all.push(match alias {
            Some(a) => format!("{a}.{column}"),
            None => column.to_string(),
        });
    }
    for column in content_columns(kind) {
        all.push(match alias {
            Some(a) => format!("{a}.{column}"),
            None => (*column).to_string(),
        });
    }
    all.join(", ")
}

/// Embedding columns a kind carries, for vector candidate scans.
pub(crate) fn embedding_columns(kind: MemoryKind) -> &'static [&'static str] {
    match kind {
        MemoryKind::Chat | MemoryKind::KnowledgeVault => &["content_embedding"],
        MemoryKind::Episodic | MemoryKind::Semantic => {
            &["summary_embedding", "details_embedding"]
        }
        MemoryKind::Procedural | MemoryKind::Resource => &["description_embedding"],
    }
}

/// Encode an embedding as an f32 little-endian blob, padded with zeros or
/// truncated to `dim`.
pub(crate) fn embedding_to_blob(embedding: &[f32], dim: usize) -> Vec<u8> {
    let mut blob = Vec::with_capacity(dim * 4);
    for i in 0..dim {
        let value = embedding.get(i).copied().unwrap_or(0.0);
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode an f32 little-endian blob back into a vector.
pub(crate) fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Pad or truncate a query vector to the store dimension so comparisons with
/// stored (padded) embeddings line up.
pub(crate) fn pad_embedding(embedding: &[f32], dim: usize) -> Vec<f32> {
    let mut padded = embedding.to_vec();
    padded.resize(dim, 0.0);
    padded
}

/// Storage engine handle: shared connection pool plus the frozen embedding
/// dimension.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pool: SqlitePool,
    embedding_dim: usize,
}

impl MemoryStore {
    /// Open the store from server configuration, applying pragmas and
    /// migrations.
    pub async fn open(config: &ServerConfig) -> Result<Self> {
        Self::open_at(
            &config.database_url,
            config.db_max_connections,
            config.embedding_dim,
        )
        .await
    }

    /// Open the store at an explicit URL. WAL journaling for concurrent
    /// readers; a short busy timeout so a locked row is skipped rather than
    /// stalling a decay cycle.
    pub async fn open_at(url: &str, max_connections: u32, embedding_dim: usize) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?
            .create_if_missing(true)
            .pragma("journal_mode", "WAL")
            .pragma("synchronous", "NORMAL")
            .pragma("foreign_keys", "ON")
            .pragma("busy_timeout", "5000");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::BackendUnavailable(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::BackendUnavailable(format!("migration failed: {e}")))?;

        info!(url = %url, pool_size = max_connections, "Connected to memory store");

        Ok(Self {
            pool,
            embedding_dim,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Maximum embedding dimension `D_max`.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Begin a transaction. Retrieval reads, counter updates, and rehearsal
    /// effects commit or roll back as one unit.
    pub async fn begin(&self) -> Result<Transaction<'_, sqlx::Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Fetch one item by id within a tenant scope, across all kinds.
    pub async fn get(&self, tenant: &TenantScope, id: &str) -> Result<MemoryItem> {
        let mut conn = self.pool.acquire().await?;
        for kind in MemoryKind::ALL {
            if let Some(item) = fetch_by_id(&mut conn, kind, tenant, id).await? {
                return Ok(item);
            }
        }
        Err(AppError::NotFound(id.to_string()))
    }

    /// Distinct organization ids present anywhere in the store. Used by the
    /// background decay scheduler to walk tenants.
    pub async fn list_organizations(&self) -> Result<Vec<String>> {
        let sql = MemoryKind::ALL
            .iter()
            .map(|kind| format!("SELECT organization_id FROM {}", kind.table()))
            .collect::<Vec<_>>()
            .join(" UNION ");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut orgs: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<std::result::Result<_, _>>()?;
        orgs.sort();
        Ok(orgs)
    }
}

/// Fetch one item by id from a single kind table.
pub(crate) async fn fetch_by_id(
    conn: &mut SqliteConnection,
    kind: MemoryKind,
    tenant: &TenantScope,
    id: &str,
) -> Result<Option<MemoryItem>> {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE id = ? AND organization_id = ?",
        select_columns(kind, None),
        kind.table()
    );
    if tenant.user_id.is_some() {
        sql.push_str(" AND user_id = ?");
    }

    let mut query = sqlx::query(&sql).bind(id).bind(&tenant.organization_id);
    if let Some(user_id) = &tenant.user_id {
        query = query.bind(user_id);
    }

    let row = query.fetch_optional(&mut *conn).await?;
    row.map(|r| decode_item(kind, &r)).transpose()
}

/// Decode a row from a kind table into a `MemoryItem`.
pub(crate) fn decode_item(kind: MemoryKind, row: &SqliteRow) -> Result<MemoryItem> {
    let metadata_raw: String = row.try_get("metadata")?;
    let metadata = serde_json::from_str(&metadata_raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt metadata column: {e}")))?;

    let content = decode_content(kind, row)?;

    Ok(MemoryItem {
        id: row.try_get("id")?,
        tenant: TenantScope {
            organization_id: row.try_get("organization_id")?,
            user_id: row.try_get("user_id")?,
        },
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        importance_score: row.try_get("importance_score")?,
        access_count: row.try_get("access_count")?,
        last_accessed_at: row.try_get::<Option<DateTime<Utc>>, _>("last_accessed_at")?,
        rehearsal_count: row.try_get("rehearsal_count")?,
        metadata,
        last_modified: LastModified {
            timestamp: row.try_get::<DateTime<Utc>, _>("last_modified_at")?,
            operation: row.try_get("last_modified_op")?,
        },
        content,
    })
}

fn decode_content(kind: MemoryKind, row: &SqliteRow) -> Result<MemoryContent> {
    let embedding = |column: &str| -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = row.try_get(column)?;
        Ok(blob.map(|b| blob_to_embedding(&b)))
    };
    let string_list = |column: &str| -> Result<Vec<String>> {
        let raw: String = row.try_get(column)?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt {column} column: {e}")))
    };

    let content = match kind {
        MemoryKind::Chat => {
            let role_raw: String = row.try_get("role")?;
            let role = ChatRole::parse(&role_raw).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("unknown chat role '{role_raw}'"))
            })?;
            MemoryContent::Chat(ChatContent {
                session_id: row.try_get("session_id")?,
                role,
                content: row.try_get("content")?,
                content_embedding: embedding("content_embedding")?,
            })
        }
        MemoryKind::Episodic => MemoryContent::Episodic(EpisodicContent {
            actor: row.try_get("actor")?,
            event_type: row.try_get("event_type")?,
            summary: row.try_get("summary")?,
            details: row.try_get("details")?,
            tree_path: string_list("tree_path")?,
            summary_embedding: embedding("summary_embedding")?,
            details_embedding: embedding("details_embedding")?,
        }),
        MemoryKind::Semantic => MemoryContent::Semantic(SemanticContent {
            name: row.try_get("name")?,
            summary: row.try_get("summary")?,
            details: row.try_get("details")?,
            source: row.try_get("source")?,
            tree_path: string_list("tree_path")?,
            summary_embedding: embedding("summary_embedding")?,
            details_embedding: embedding("details_embedding")?,
        }),
        MemoryKind::Procedural => MemoryContent::Procedural(ProceduralContent {
            skill_name: row.try_get("skill_name")?,
            description: row.try_get("description")?,
            steps: string_list("steps")?,
            description_embedding: embedding("description_embedding")?,
        }),
        MemoryKind::Resource => MemoryContent::Resource(ResourceContent {
            resource_name: row.try_get("resource_name")?,
            description: row.try_get("description")?,
            resource_type: row.try_get("resource_type")?,
            location: row.try_get("location")?,
            description_embedding: embedding("description_embedding")?,
        }),
        MemoryKind::KnowledgeVault => MemoryContent::KnowledgeVault(VaultContent {
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            vault_type: row.try_get("vault_type")?,
            content_embedding: embedding("content_embedding")?,
        }),
    };

    Ok(content)
}

/// Append the tenant filter to a SQL string being built; caller binds
/// `organization_id` first, then `user_id` when present.
pub(crate) fn push_tenant_filter(sql: &mut String, tenant: &TenantScope, alias: &str) {
    sql.push_str(&format!(" AND {alias}organization_id = ?"));
    if tenant.user_id.is_some() {
        sql.push_str(&format!(" AND {alias}user_id = ?"));
    }
}
