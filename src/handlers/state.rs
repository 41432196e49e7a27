//! Shared application state for the HTTP surface

use std::sync::Arc;
use std::time::Instant;

use crate::clock::Clock;
use crate::config::{ServerConfig, TemporalConfig};
use crate::decay::DecayTask;
use crate::retrieval::{Embedder, RetrievalPipeline};
use crate::store::MemoryStore;

/// Everything a handler needs: the store handle, frozen configuration, the
/// clock, and the two component facades built over them.
pub struct ServiceState {
    pub store: Arc<MemoryStore>,
    pub temporal: Arc<TemporalConfig>,
    pub server: ServerConfig,
    pub clock: Arc<dyn Clock>,
    pub pipeline: RetrievalPipeline,
    pub decay: DecayTask,
    pub started_at: Instant,
}

impl ServiceState {
    pub fn new(
        store: Arc<MemoryStore>,
        temporal: Arc<TemporalConfig>,
        server: ServerConfig,
        clock: Arc<dyn Clock>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Self {
        let pipeline = RetrievalPipeline::new(
            store.clone(),
            temporal.clone(),
            clock.clone(),
            embedder,
        );
        let decay = DecayTask::new(store.clone(), temporal.clone(), clock.clone());

        Self {
            store,
            temporal,
            server,
            clock,
            pipeline,
            decay,
            started_at: Instant::now(),
        }
    }
}
