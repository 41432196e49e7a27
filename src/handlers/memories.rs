//! Write API and item read endpoints

use axum::{
    extract::{Path, Query as UrlQuery, State},
    response::Json,
};

use super::router::AppState;
use super::types::{
    CreateMemoryRequest, CreateMemoryResponse, DeleteMemoryResponse, ListParams, ListResponse,
    MemoryItemDto, TenantParams, UpdateMemoryRequest, UpdateMemoryResponse,
};
use crate::errors::Result;
use crate::memory::TenantScope;
use crate::metrics;
use crate::store::search;
use crate::store::write::CreateRequest;
use crate::validation;

/// POST /api/memories - create a memory item
#[tracing::instrument(skip_all)]
pub async fn create_memory(
    State(state): State<AppState>,
    Json(request): Json<CreateMemoryRequest>,
) -> Result<Json<CreateMemoryResponse>> {
    let now = state.clock.now();
    let item = state
        .store
        .create(
            &state.temporal,
            CreateRequest {
                tenant: TenantScope {
                    organization_id: request.organization_id,
                    user_id: request.user_id,
                },
                content: request.content,
                importance_score: request.importance_score,
                metadata: request.metadata,
                occurred_at: request.occurred_at,
            },
            now,
        )
        .await?;

    metrics::WRITES_TOTAL
        .with_label_values(&[item.kind().as_str(), "create"])
        .inc();

    Ok(Json(CreateMemoryResponse {
        kind: item.kind(),
        created_at: item.created_at,
        importance_score: item.importance_score,
        id: item.id,
    }))
}

/// GET /api/memory/{id} - fetch one item without touching its counters
#[tracing::instrument(skip_all)]
pub async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    UrlQuery(params): UrlQuery<TenantParams>,
) -> Result<Json<MemoryItemDto>> {
    let tenant = TenantScope {
        organization_id: params.organization_id,
        user_id: params.user_id,
    };
    let item = state.store.get(&tenant, &id).await?;
    Ok(Json(item.into()))
}

/// PUT /api/memory/{id} - patch content, importance, or metadata
#[tracing::instrument(skip_all)]
pub async fn update_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMemoryRequest>,
) -> Result<Json<UpdateMemoryResponse>> {
    let (organization_id, user_id, patch) = request.into_patch();
    let tenant = TenantScope {
        organization_id,
        user_id,
    };
    let now = state.clock.now();
    let item = state
        .store
        .update(&state.temporal, &tenant, &id, patch, now)
        .await?;

    metrics::WRITES_TOTAL
        .with_label_values(&[item.kind().as_str(), "update"])
        .inc();

    Ok(Json(UpdateMemoryResponse {
        id: item.id,
        last_modified: item.last_modified,
    }))
}

/// DELETE /api/memory/{id} - hard delete, idempotent
#[tracing::instrument(skip_all)]
pub async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    UrlQuery(params): UrlQuery<TenantParams>,
) -> Result<Json<DeleteMemoryResponse>> {
    let tenant = TenantScope {
        organization_id: params.organization_id,
        user_id: params.user_id,
    };
    let deleted = state.store.delete(&tenant, &id).await?;

    if deleted {
        metrics::WRITES_TOTAL
            .with_label_values(&["any", "delete"])
            .inc();
    }

    Ok(Json(DeleteMemoryResponse { id, deleted }))
}

/// GET /api/memories - list one kind's items, newest first, optionally
/// bounded to a `[start, end)` creation window
#[tracing::instrument(skip_all)]
pub async fn list_memories(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<ListParams>,
) -> Result<Json<ListResponse>> {
    let limit = params.limit.unwrap_or(crate::constants::DEFAULT_RETRIEVAL_LIMIT);
    validation::validate_limit(limit)
        .map_err(|e| crate::errors::AppError::invalid_query("limit", e.to_string()))?;

    let tenant = TenantScope {
        organization_id: params.organization_id,
        user_id: params.user_id,
    };

    let mut conn = state.store.pool().acquire().await?;
    let items = match (params.start, params.end) {
        (Some(start), end) => {
            let end = end.unwrap_or_else(|| state.clock.now());
            search::items_in_time_range(&mut conn, params.kind, &tenant, start, end, limit).await?
        }
        _ => search::recent_candidates(&mut conn, params.kind, &tenant, None, limit).await?,
    };

    let items: Vec<MemoryItemDto> = items.into_iter().map(Into::into).collect();
    Ok(Json(ListResponse {
        total: items.len(),
        items,
    }))
}
