//! Router configuration - centralized route definitions

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use super::state::ServiceState;
use super::{admin, decay, health, memories, retrieve};

/// Application state type alias
pub type AppState = Arc<ServiceState>;

/// Build the complete router.
///
/// Authentication and transport are handled upstream; tenancy arrives as
/// opaque identifiers in each request.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // =================================================================
        // HEALTH & METRICS
        // =================================================================
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics_endpoint))
        // =================================================================
        // RETRIEVAL
        // =================================================================
        .route("/api/retrieve", post(retrieve::retrieve))
        // =================================================================
        // WRITE API
        // =================================================================
        .route("/api/memories", post(memories::create_memory))
        .route("/api/memories", get(memories::list_memories))
        .route("/api/memory/{id}", get(memories::get_memory))
        .route("/api/memory/{id}", put(memories::update_memory))
        .route("/api/memory/{id}", delete(memories::delete_memory))
        // =================================================================
        // DECAY TASK
        // =================================================================
        .route("/api/decay/run", post(decay::run_decay))
        // =================================================================
        // ADMIN VIEWS
        // =================================================================
        .route("/api/admin/count", get(admin::count_items))
        .route("/api/admin/forgettable", get(admin::forgettable_count))
        .route("/api/admin/distribution", get(admin::distribution))
        // =================================================================
        // STATE
        // =================================================================
        .with_state(state)
}
