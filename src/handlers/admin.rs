//! Read-only admin views for dashboards

use axum::{
    extract::{Query as UrlQuery, State},
    response::Json,
};

use super::router::AppState;
use super::types::{AdminCountParams, CountResponse, DistributionParams};
use crate::errors::Result;
use crate::memory::TenantScope;
use crate::store::admin::{ForgettableStats, Histogram};

/// GET /api/admin/count - item counts per tenant, optionally per kind
#[tracing::instrument(skip_all)]
pub async fn count_items(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<AdminCountParams>,
) -> Result<Json<CountResponse>> {
    let tenant = TenantScope {
        organization_id: params.organization_id,
        user_id: params.user_id,
    };
    let count = state.store.count_items(&tenant, params.kind).await?;
    Ok(Json(CountResponse { count }))
}

/// GET /api/admin/forgettable - items currently matching the deletion
/// predicate, grouped by reason
#[tracing::instrument(skip_all)]
pub async fn forgettable_count(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<AdminCountParams>,
) -> Result<Json<ForgettableStats>> {
    let tenant = TenantScope {
        organization_id: params.organization_id,
        user_id: params.user_id,
    };
    let stats = state
        .store
        .forgettable_count(&state.temporal, &tenant, params.kind, state.clock.now())
        .await?;
    Ok(Json(stats))
}

/// GET /api/admin/distribution - histogram of a stored attribute
#[tracing::instrument(skip_all)]
pub async fn distribution(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<DistributionParams>,
) -> Result<Json<Histogram>> {
    let tenant = TenantScope {
        organization_id: params.organization_id,
        user_id: params.user_id,
    };
    let histogram = state
        .store
        .distribution(&tenant, params.kind, params.field, state.clock.now())
        .await?;
    Ok(Json(histogram))
}
