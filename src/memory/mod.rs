//! Domain types for the temporal memory store

pub mod types;

pub use types::{
    ChatContent, ChatRole, EpisodicContent, LastModified, MemoryContent, MemoryItem, MemoryKind,
    ProceduralContent, Query, ResourceContent, RetrievalResult, RetrievedItem, SemanticContent,
    TenantScope, VaultContent, WeightOverrides,
};
