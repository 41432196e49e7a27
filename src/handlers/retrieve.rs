//! Retrieval endpoint

use axum::{extract::State, response::Json};

use super::router::AppState;
use super::types::RetrieveResponse;
use crate::errors::Result;
use crate::memory::Query;

/// POST /api/retrieve - ranked retrieval with access tracking and rehearsal
#[tracing::instrument(skip_all)]
pub async fn retrieve(
    State(state): State<AppState>,
    Json(query): Json<Query>,
) -> Result<Json<RetrieveResponse>> {
    let result = state.pipeline.retrieve(query).await?;
    Ok(Json(result.into()))
}
