//! Core types for the memory system
//!
//! Six concrete item kinds share one temporal envelope (tenant scope,
//! importance, access counters, audit stamp); the kind-specific content
//! travels as a tagged enum so the store can route it to the right table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::constants::DEFAULT_RETRIEVAL_LIMIT;
use crate::scoring::TemporalRecord;

/// The six persisted memory kinds, each backed by its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Chat,
    Episodic,
    Semantic,
    Procedural,
    Resource,
    KnowledgeVault,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 6] = [
        MemoryKind::Chat,
        MemoryKind::Episodic,
        MemoryKind::Semantic,
        MemoryKind::Procedural,
        MemoryKind::Resource,
        MemoryKind::KnowledgeVault,
    ];

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Chat => "chat_messages",
            Self::Episodic => "episodic_events",
            Self::Semantic => "semantic_items",
            Self::Procedural => "procedural_items",
            Self::Resource => "resource_items",
            Self::KnowledgeVault => "knowledge_vault_items",
        }
    }

    /// FTS5 companion table over the kind's lexical fields.
    pub fn fts_table(self) -> &'static str {
        match self {
            Self::Chat => "chat_messages_fts",
            Self::Episodic => "episodic_events_fts",
            Self::Semantic => "semantic_items_fts",
            Self::Procedural => "procedural_items_fts",
            Self::Resource => "resource_items_fts",
            Self::KnowledgeVault => "knowledge_vault_items_fts",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Resource => "resource",
            Self::KnowledgeVault => "knowledge_vault",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility scope carried by every record. `organization_id` is mandatory;
/// `user_id`, when present, narrows reads and deletes further.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TenantScope {
    pub fn org(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: None,
        }
    }

    pub fn user(organization_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: Some(user_id.into()),
        }
    }
}

/// Audit stamp written on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastModified {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
}

impl LastModified {
    pub const OP_CREATED: &'static str = "created";
    pub const OP_UPDATED: &'static str = "updated";
    pub const OP_ACCESSED: &'static str = "accessed";
    pub const OP_REHEARSED: &'static str = "rehearsed";

    pub fn new(timestamp: DateTime<Utc>, operation: &str) -> Self {
        Self {
            timestamp,
            operation: operation.to_string(),
        }
    }
}

/// Role of a chat message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatContent {
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicContent {
    pub actor: String,
    pub event_type: String,
    pub summary: String,
    pub details: String,
    #[serde(default)]
    pub tree_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticContent {
    pub name: String,
    pub summary: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub tree_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceduralContent {
    pub skill_name: String,
    pub description: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub resource_name: String,
    pub description: String,
    pub resource_type: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultContent {
    pub title: String,
    pub content: String,
    pub vault_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_embedding: Option<Vec<f32>>,
}

/// Kind-specific content, tagged so API payloads carry their kind inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryContent {
    Chat(ChatContent),
    Episodic(EpisodicContent),
    Semantic(SemanticContent),
    Procedural(ProceduralContent),
    Resource(ResourceContent),
    KnowledgeVault(VaultContent),
}

impl MemoryContent {
    pub fn kind(&self) -> MemoryKind {
        match self {
            Self::Chat(_) => MemoryKind::Chat,
            Self::Episodic(_) => MemoryKind::Episodic,
            Self::Semantic(_) => MemoryKind::Semantic,
            Self::Procedural(_) => MemoryKind::Procedural,
            Self::Resource(_) => MemoryKind::Resource,
            Self::KnowledgeVault(_) => MemoryKind::KnowledgeVault,
        }
    }

    /// Copy of the content with embedding vectors stripped, for read
    /// responses that should not ship raw vectors back to clients.
    pub fn without_embeddings(&self) -> MemoryContent {
        let mut copy = self.clone();
        match &mut copy {
            Self::Chat(c) => c.content_embedding = None,
            Self::Episodic(c) => {
                c.summary_embedding = None;
                c.details_embedding = None;
            }
            Self::Semantic(c) => {
                c.summary_embedding = None;
                c.details_embedding = None;
            }
            Self::Procedural(c) => c.description_embedding = None,
            Self::Resource(c) => c.description_embedding = None,
            Self::KnowledgeVault(c) => c.content_embedding = None,
        }
        copy
    }

    /// All embedding vectors present on this content, with their column names.
    pub fn embeddings(&self) -> Vec<(&'static str, &Vec<f32>)> {
        let mut out = Vec::new();
        match self {
            Self::Chat(c) => {
                if let Some(v) = &c.content_embedding {
                    out.push(("content_embedding", v));
                }
            }
            Self::Episodic(c) => {
                if let Some(v) = &c.summary_embedding {
                    out.push(("summary_embedding", v));
                }
                if let Some(v) = &c.details_embedding {
                    out.push(("details_embedding", v));
                }
            }
            Self::Semantic(c) => {
                if let Some(v) = &c.summary_embedding {
                    out.push(("summary_embedding", v));
                }
                if let Some(v) = &c.details_embedding {
                    out.push(("details_embedding", v));
                }
            }
            Self::Procedural(c) => {
                if let Some(v) = &c.description_embedding {
                    out.push(("description_embedding", v));
                }
            }
            Self::Resource(c) => {
                if let Some(v) = &c.description_embedding {
                    out.push(("description_embedding", v));
                }
            }
            Self::KnowledgeVault(c) => {
                if let Some(v) = &c.content_embedding {
                    out.push(("content_embedding", v));
                }
            }
        }
        out
    }
}

/// A fully materialized memory item: temporal envelope plus content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    pub id: String,
    #[serde(flatten)]
    pub tenant: TenantScope,
    pub created_at: DateTime<Utc>,
    pub importance_score: f64,
    pub access_count: i64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub rehearsal_count: i64,
    pub metadata: JsonValue,
    pub last_modified: LastModified,
    pub content: MemoryContent,
}

impl MemoryItem {
    pub fn kind(&self) -> MemoryKind {
        self.content.kind()
    }
}

impl TemporalRecord for MemoryItem {
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

/// Optional per-query overrides for the combined-score weights.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WeightOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<f64>,
}

/// A retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub organization_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Kinds to search; empty means all kinds.
    #[serde(default)]
    pub kinds: Vec<MemoryKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightOverrides>,
    /// Narrows recent-candidate queries on the chat kind to one session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_RETRIEVAL_LIMIT
}

impl Query {
    pub fn tenant(&self) -> TenantScope {
        TenantScope {
            organization_id: self.organization_id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    /// Kinds to search, defaulting to all.
    pub fn effective_kinds(&self) -> Vec<MemoryKind> {
        if self.kinds.is_empty() {
            MemoryKind::ALL.to_vec()
        } else {
            let mut kinds = self.kinds.clone();
            kinds.sort();
            kinds.dedup();
            kinds
        }
    }
}

/// One ranked retrieval hit with its score breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedItem {
    pub item: MemoryItem,
    pub relevance: f64,
    pub temporal: f64,
    pub combined: f64,
    pub age_days: f64,
    pub was_rehearsed: bool,
}

/// Envelope returned by the retrieval pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub items: Vec<RetrievedItem>,
    /// Distinct candidates scanned across all requested kinds.
    pub scanned_candidates: usize,
    pub elapsed_ms: u64,
    /// True when vector search was requested but the embedding provider
    /// could not serve it; the result is lexical-only.
    pub vector_unavailable: bool,
}
