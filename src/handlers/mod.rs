//! HTTP API handlers
//!
//! Each submodule handles one domain of the REST surface; the router wires
//! them together over the shared `ServiceState`.

// Core modules
pub mod router;
pub mod state;
pub mod types;

// Health and metrics
pub mod health;

// Memory core operations
pub mod memories;
pub mod retrieve;

// Maintenance
pub mod admin;
pub mod decay;

// Re-export commonly used items
pub use router::{build_router, AppState};
pub use state::ServiceState;
