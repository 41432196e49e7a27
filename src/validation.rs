//! Input validation for the write and retrieval surfaces
//!
//! Rejects malformed tenant identifiers, out-of-range limits, oversized
//! payloads, and non-finite embeddings before any side effect.

use anyhow::{anyhow, Result};

use crate::memory::{MemoryContent, Query};

/// Maximum lengths and sizes
pub const MAX_TENANT_ID_LENGTH: usize = 128;
pub const MAX_CONTENT_LENGTH: usize = 50_000; // 50KB per text field
pub const MAX_METADATA_SIZE: usize = 10_000; // serialized JSON bytes
pub const MAX_RESULTS: usize = 1_000;
pub const MAX_QUERY_TEXT_LENGTH: usize = 4_096;
pub const MAX_STEPS_PER_PROCEDURE: usize = 200;

/// Validate an organization or user identifier.
pub fn validate_tenant_id(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(anyhow!("{field} cannot be empty"));
    }

    if value.len() > MAX_TENANT_ID_LENGTH {
        return Err(anyhow!(
            "{field} too long: {} chars (max: {MAX_TENANT_ID_LENGTH})",
            value.len()
        ));
    }

    // Only allow alphanumeric, dash, underscore, at-sign, dot
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.')
    {
        return Err(anyhow!(
            "{field} contains invalid characters (allowed: alphanumeric, -, _, @, .)"
        ));
    }

    Ok(())
}

/// Validate a result limit.
pub fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(anyhow!("limit must be greater than 0"));
    }

    if limit > MAX_RESULTS {
        return Err(anyhow!("limit too large: {limit} (max: {MAX_RESULTS})"));
    }

    Ok(())
}

/// Validate an importance score is a usable number. Range is clamped by the
/// store, not rejected here.
pub fn validate_importance(importance: f64) -> Result<()> {
    if !importance.is_finite() {
        return Err(anyhow!("importance_score must be a finite number"));
    }
    Ok(())
}

/// Validate an embedding vector against the configured maximum dimension.
pub fn validate_embedding(embedding: &[f32], max_dim: usize) -> Result<()> {
    if embedding.is_empty() {
        return Err(anyhow!("embedding cannot be empty"));
    }

    if embedding.len() > max_dim {
        return Err(anyhow!(
            "embedding dimension {} exceeds configured maximum {max_dim}",
            embedding.len()
        ));
    }

    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(anyhow!("embedding contains NaN or Inf values"));
    }

    Ok(())
}

/// Validate metadata JSON size.
pub fn validate_metadata(metadata: &serde_json::Value) -> Result<()> {
    let size = metadata.to_string().len();
    if size > MAX_METADATA_SIZE {
        return Err(anyhow!(
            "metadata too large: {size} bytes (max: {MAX_METADATA_SIZE})"
        ));
    }
    Ok(())
}

fn validate_text_field(field: &str, value: &str, allow_empty: bool) -> Result<()> {
    if !allow_empty && value.trim().is_empty() {
        return Err(anyhow!("{field} cannot be empty"));
    }

    if value.len() > MAX_CONTENT_LENGTH {
        return Err(anyhow!(
            "{field} too long: {} chars (max: {MAX_CONTENT_LENGTH})",
            value.len()
        ));
    }

    Ok(())
}

/// Validate kind-specific content fields and any attached embeddings.
pub fn validate_content(content: &MemoryContent, max_embedding_dim: usize) -> Result<()> {
    match content {
        MemoryContent::Chat(c) => {
            validate_tenant_id("session_id", &c.session_id)?;
            validate_text_field("content", &c.content, false)?;
        }
        MemoryContent::Episodic(c) => {
            validate_text_field("actor", &c.actor, false)?;
            validate_text_field("event_type", &c.event_type, false)?;
            validate_text_field("summary", &c.summary, false)?;
            validate_text_field("details", &c.details, true)?;
        }
        MemoryContent::Semantic(c) => {
            validate_text_field("name", &c.name, false)?;
            validate_text_field("summary", &c.summary, false)?;
            validate_text_field("details", &c.details, true)?;
        }
        MemoryContent::Procedural(c) => {
            validate_text_field("skill_name", &c.skill_name, false)?;
            validate_text_field("description", &c.description, false)?;
            if c.steps.len() > MAX_STEPS_PER_PROCEDURE {
                return Err(anyhow!(
                    "too many steps: {} (max: {MAX_STEPS_PER_PROCEDURE})",
                    c.steps.len()
                ));
            }
        }
        MemoryContent::Resource(c) => {
            validate_text_field("resource_name", &c.resource_name, false)?;
            validate_text_field("description", &c.description, true)?;
            validate_text_field("resource_type", &c.resource_type, false)?;
            validate_text_field("location", &c.location, false)?;
        }
        MemoryContent::KnowledgeVault(c) => {
            validate_text_field("title", &c.title, false)?;
            validate_text_field("content", &c.content, false)?;
            validate_text_field("vault_type", &c.vault_type, false)?;
        }
    }

    for (column, embedding) in content.embeddings() {
        validate_embedding(embedding, max_embedding_dim)
            .map_err(|e| anyhow!("{column}: {e}"))?;
    }

    Ok(())
}

/// Validate a retrieval query end to end.
pub fn validate_query(query: &Query, max_embedding_dim: usize) -> Result<()> {
    validate_tenant_id("organization_id", &query.organization_id)?;
    if let Some(user_id) = &query.user_id {
        validate_tenant_id("user_id", user_id)?;
    }
    if let Some(session_id) = &query.session_id {
        validate_tenant_id("session_id", session_id)?;
    }

    validate_limit(query.limit)?;

    if let Some(text) = &query.text {
        if text.len() > MAX_QUERY_TEXT_LENGTH {
            return Err(anyhow!(
                "query text too long: {} chars (max: {MAX_QUERY_TEXT_LENGTH})",
                text.len()
            ));
        }
    }

    if let Some(vector) = &query.vector {
        validate_embedding(vector, max_embedding_dim)?;
    }

    if let Some(weights) = &query.weights {
        for (name, value) in [
            ("weights.relevance", weights.relevance),
            ("weights.temporal", weights.temporal),
        ] {
            if let Some(w) = value {
                if !w.is_finite() || w < 0.0 {
                    return Err(anyhow!("{name} must be a non-negative finite number"));
                }
            }
        }
    }

    Ok(())
}
