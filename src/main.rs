//! Smriti-Memory Server - temporal memory store for AI agents
//!
//! Entry point: config from environment, SQLite-backed store, axum API,
//! and a background decay scheduler that walks tenants one at a time.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use smriti_memory::{
    clock::SystemClock,
    config::{self, ServerConfig, TemporalConfig},
    decay::DecayRequest,
    handlers::{self, AppState, ServiceState},
    metrics,
    store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "smriti_memory=info,tower_http=warn");
    }
    tracing_subscriber::fmt::init();

    info!("Smriti-Memory v{}", env!("CARGO_PKG_VERSION"));

    // Register Prometheus metrics
    metrics::register_metrics().expect("Failed to register metrics");

    // Load and validate configuration
    config::warn_unknown_env();
    let temporal = TemporalConfig::from_env();
    temporal.validate()?;
    let server = ServerConfig::from_env();
    server.log(&temporal);

    // Open the store (runs migrations)
    let store = Arc::new(MemoryStore::open(&server).await?);

    let state: AppState = Arc::new(ServiceState::new(
        store,
        Arc::new(temporal),
        server.clone(),
        Arc::new(SystemClock),
        None, // embedding provider is wired by the deployment, not the core
    ));

    // Shutdown broadcast for the server and the decay scheduler
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let scheduler = if server.decay_interval_secs > 0 {
        Some(tokio::spawn(decay_scheduler(
            state.clone(),
            server.decay_interval_secs,
            server.decay_batch_size,
            shutdown_rx,
        )))
    } else {
        None
    };

    let app = handlers::build_router(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Some(scheduler) = scheduler {
        let _ = scheduler.await;
    }
    info!("Shutdown complete");

    Ok(())
}

/// Background decay worker: every interval, walk every organization present
/// in the store and run one live decay cycle per tenant, one at a time.
async fn decay_scheduler(
    state: AppState,
    interval_secs: u64,
    batch_size: usize,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the immediate first tick; the store may still be warming up.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                info!("decay scheduler stopping");
                return;
            }
        }

        let organizations = match state.store.list_organizations().await {
            Ok(organizations) => organizations,
            Err(e) => {
                error!(error = %e, "decay scheduler could not list organizations");
                continue;
            }
        };

        for organization_id in organizations {
            let request = DecayRequest {
                organization_id: organization_id.clone(),
                user_id: None,
                dry_run: false,
                batch_size,
            };

            tokio::select! {
                result = state.decay.run_cycle(request) => {
                    match result {
                        Ok(report) if report.total_errors() > 0 => {
                            warn!(
                                organization_id = %organization_id,
                                deleted = report.total_deleted(),
                                errors = report.total_errors(),
                                "scheduled decay cycle finished with partial errors"
                            );
                        }
                        Ok(report) => {
                            if report.total_deleted() > 0 {
                                info!(
                                    organization_id = %organization_id,
                                    deleted = report.total_deleted(),
                                    "scheduled decay cycle finished"
                                );
                            }
                        }
                        Err(e) => {
                            error!(organization_id = %organization_id, error = %e, "scheduled decay cycle failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!(organization_id = %organization_id, "decay cycle cancelled mid-tenant by shutdown");
                    return;
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
