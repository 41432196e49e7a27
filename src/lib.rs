//! Smriti-Memory Library
//!
//! Temporal memory store for AI agents: heterogeneous memory items scored by
//! a blend of semantic relevance and time-aware utility, strengthened when
//! retrieved with high relevance, and evicted once their utility decays
//! below threshold.
//!
//! # Architecture
//! - Pure scoring engine (hybrid exponential/power-law decay, recency,
//!   frequency) with injected clock and frozen config
//! - Relational store (SQLite): one table per memory kind, FTS5 for BM25
//!   lexical search, embeddings as padded blobs
//! - Retrieval pipeline: candidate union, combined scoring, access tracking
//!   and rehearsal committed atomically with the read
//! - Decay task: batched, dry-runnable eviction per tenant

pub mod clock;
pub mod config;
pub mod constants;
pub mod decay;
pub mod errors;
pub mod handlers;
pub mod memory;
pub mod metrics;
pub mod retrieval;
pub mod scoring;
pub mod similarity;
pub mod store;
pub mod validation;

// Re-export dependencies so tests use the same versions
pub use chrono;
pub use parking_lot;
pub use uuid;
