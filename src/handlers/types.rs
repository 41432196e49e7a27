//! Request and response DTOs shared by the HTTP handlers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::memory::{LastModified, MemoryContent, MemoryKind, RetrievalResult, RetrievedItem};
use crate::store::write::UpdatePatch;

/// One retrieval hit as returned over the wire. Embedding vectors are
/// stripped; scores are the breakdown the pipeline computed.
#[derive(Debug, Serialize)]
pub struct RetrievedItemDto {
    pub id: String,
    pub kind: MemoryKind,
    pub content: MemoryContent,
    pub created_at: DateTime<Utc>,
    pub importance_score: f64,
    pub access_count: i64,
    pub rehearsal_count: i64,
    pub last_modified: LastModified,
    pub metadata: JsonValue,
    pub relevance: f64,
    pub temporal: f64,
    pub combined: f64,
    pub age_days: f64,
    pub was_rehearsed: bool,
}

impl From<RetrievedItem> for RetrievedItemDto {
    fn from(hit: RetrievedItem) -> Self {
        Self {
            id: hit.item.id,
            kind: hit.item.content.kind(),
            content: hit.item.content.without_embeddings(),
            created_at: hit.item.created_at,
            importance_score: hit.item.importance_score,
            access_count: hit.item.access_count,
            rehearsal_count: hit.item.rehearsal_count,
            last_modified: hit.item.last_modified,
            metadata: hit.item.metadata,
            relevance: hit.relevance,
            temporal: hit.temporal,
            combined: hit.combined,
            age_days: hit.age_days,
            was_rehearsed: hit.was_rehearsed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub items: Vec<RetrievedItemDto>,
    pub scanned_candidates: usize,
    pub elapsed_ms: u64,
    pub vector_unavailable: bool,
}

impl From<RetrievalResult> for RetrieveResponse {
    fn from(result: RetrievalResult) -> Self {
        Self {
            items: result.items.into_iter().map(Into::into).collect(),
            scanned_candidates: result.scanned_candidates,
            elapsed_ms: result.elapsed_ms,
            vector_unavailable: result.vector_unavailable,
        }
    }
}

/// POST /api/memories
///
/// Counters and `last_accessed_at` are owned by the retrieval pipeline and
/// the decay task; unknown fields here are rejected, not ignored.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMemoryRequest {
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub content: MemoryContent,
    #[serde(default)]
    pub importance_score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateMemoryResponse {
    pub id: String,
    pub kind: MemoryKind,
    pub created_at: DateTime<Utc>,
    pub importance_score: f64,
}

/// PUT /api/memory/{id}
///
/// Counter fields are not part of this surface; unknown fields are rejected.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMemoryRequest {
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub content: Option<MemoryContent>,
    #[serde(default)]
    pub importance_score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

impl UpdateMemoryRequest {
    pub fn into_patch(self) -> (String, Option<String>, UpdatePatch) {
        (
            self.organization_id,
            self.user_id,
            UpdatePatch {
                content: self.content,
                importance_score: self.importance_score,
                metadata: self.metadata,
            },
        )
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateMemoryResponse {
    pub id: String,
    pub last_modified: LastModified,
}

#[derive(Debug, Serialize)]
pub struct DeleteMemoryResponse {
    pub id: String,
    /// False when the id was already absent; the delete is idempotent either way.
    pub deleted: bool,
}

/// Tenant scope carried in query parameters for GET/DELETE endpoints.
#[derive(Debug, Deserialize)]
pub struct TenantParams {
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// GET /api/memories list parameters.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub kind: MemoryKind,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// A single item in list responses (no score breakdown, no embeddings).
#[derive(Debug, Serialize)]
pub struct MemoryItemDto {
    pub id: String,
    pub kind: MemoryKind,
    pub content: MemoryContent,
    pub created_at: DateTime<Utc>,
    pub importance_score: f64,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub rehearsal_count: i64,
    pub metadata: JsonValue,
    pub last_modified: LastModified,
}

impl From<crate::memory::MemoryItem> for MemoryItemDto {
    fn from(item: crate::memory::MemoryItem) -> Self {
        Self {
            id: item.id,
            kind: item.content.kind(),
            content: item.content.without_embeddings(),
            created_at: item.created_at,
            importance_score: item.importance_score,
            access_count: item.access_count,
            last_accessed_at: item.last_accessed_at,
            rehearsal_count: item.rehearsal_count,
            metadata: item.metadata,
            last_modified: item.last_modified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<MemoryItemDto>,
    pub total: usize,
}

/// GET /api/admin/count and /api/admin/forgettable parameters.
#[derive(Debug, Deserialize)]
pub struct AdminCountParams {
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub kind: Option<MemoryKind>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

/// GET /api/admin/distribution parameters.
#[derive(Debug, Deserialize)]
pub struct DistributionParams {
    pub organization_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub kind: MemoryKind,
    pub field: crate::store::admin::DistributionField,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}
