//! Health and metrics endpoints

use axum::{extract::State, http::StatusCode, response::Json};
use prometheus::{Encoder, TextEncoder};

use super::router::AppState;
use super::types::HealthResponse;
use crate::metrics::METRICS_REGISTRY;

/// GET /health - liveness plus a store ping
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = !state.store.pool().is_closed();

    let status_code = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if store_ok { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.started_at.elapsed().as_secs(),
        }),
    )
}

/// GET /metrics - Prometheus exposition
pub async fn metrics_endpoint() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            String::from_utf8(buffer).unwrap_or_default(),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        ),
    }
}
