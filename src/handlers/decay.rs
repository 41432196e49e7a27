//! Decay task endpoint

use axum::{extract::State, response::Json};

use super::router::AppState;
use crate::decay::{DecayReport, DecayRequest};
use crate::errors::Result;

/// POST /api/decay/run - run one decay cycle for a tenant; `dry_run` returns
/// the plan without deleting
#[tracing::instrument(skip_all)]
pub async fn run_decay(
    State(state): State<AppState>,
    Json(request): Json<DecayRequest>,
) -> Result<Json<DecayReport>> {
    let report = state.decay.run_cycle(request).await?;
    Ok(Json(report))
}
