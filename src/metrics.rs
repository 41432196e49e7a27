//! Prometheus metrics for the memory store
//!
//! Aggregate counters and durations only; tenant identifiers never appear in
//! labels to keep cardinality bounded.

use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};

lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Retrieval metrics
    // ============================================================================

    /// Retrieval operations by result
    pub static ref RETRIEVALS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_retrievals_total", "Total retrieval operations"),
        &["result"]
    ).unwrap();

    /// Retrieval duration
    pub static ref RETRIEVE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "smriti_retrieve_duration_seconds",
            "Retrieval pipeline duration"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0])
    ).unwrap();

    /// Candidates scanned per retrieval
    pub static ref RETRIEVE_CANDIDATES: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "smriti_retrieve_candidates",
            "Distinct candidates scanned per retrieval"
        )
        .buckets(vec![0.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 3000.0])
    ).unwrap();

    /// Items strengthened on retrieval
    pub static ref REHEARSALS_TOTAL: IntCounter = IntCounter::new(
        "smriti_rehearsals_total",
        "Total rehearsal effects applied"
    ).unwrap();

    // ============================================================================
    // Write metrics
    // ============================================================================

    /// Write API operations by kind and operation
    pub static ref WRITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_writes_total", "Total write API operations"),
        &["kind", "operation"]
    ).unwrap();

    // ============================================================================
    // Decay metrics
    // ============================================================================

    /// Decay cycles run, by mode
    pub static ref DECAY_CYCLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_decay_cycles_total", "Total decay cycles"),
        &["mode"]
    ).unwrap();

    /// Items selected for deletion, by kind and reason
    pub static ref DECAY_SELECTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_decay_selected_total", "Items matching the deletion predicate"),
        &["kind", "reason"]
    ).unwrap();

    /// Items actually deleted, by kind
    pub static ref DECAY_DELETED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_decay_deleted_total", "Items deleted by the decay task"),
        &["kind"]
    ).unwrap();

    // ============================================================================
    // Error metrics
    // ============================================================================

    /// Errors surfaced to callers, by code
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("smriti_errors_total", "Total errors by code"),
        &["code"]
    ).unwrap();
}

/// Register all metrics with the global registry
pub fn register_metrics() -> Result<(), prometheus::Error> {
    METRICS_REGISTRY.register(Box::new(RETRIEVALS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(RETRIEVE_DURATION.clone()))?;
    METRICS_REGISTRY.register(Box::new(RETRIEVE_CANDIDATES.clone()))?;
    METRICS_REGISTRY.register(Box::new(REHEARSALS_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(WRITES_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(DECAY_CYCLES_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(DECAY_SELECTED_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(DECAY_DELETED_TOTAL.clone()))?;
    METRICS_REGISTRY.register(Box::new(ERRORS_TOTAL.clone()))?;

    Ok(())
}

/// Helper to time operations with histogram (RAII pattern)
/// Usage: let _timer = Timer::new(SOME_HISTOGRAM.clone());
pub struct Timer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl Timer {
    /// Create timer that records duration to histogram on drop
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}
