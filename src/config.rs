//! Configuration management for the temporal memory store
//!
//! All configurable parameters in one place with environment variable
//! overrides (`SMRITI_*`). Sensible defaults, configurable in production,
//! frozen after startup; runtime changes require a restart.

use anyhow::{anyhow, Result};
use std::env;
use tracing::{info, warn};

use crate::constants::{DECAY_DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_DIM};

/// Temporal scoring and eviction parameters.
///
/// Every field can be overridden by an environment variable of the same name
/// upper-cased with the `SMRITI_` prefix (e.g. `SMRITI_DECAY_LAMBDA`).
/// Validated once at startup; the scoring engine treats the struct as frozen.
#[derive(Debug, Clone)]
pub struct TemporalConfig {
    /// Master switch. When false the temporal score collapses to the clamped
    /// importance score and no rehearsal or eviction occurs.
    pub enabled: bool,

    /// Rate of the exponential decay component, per day.
    pub decay_lambda: f64,

    /// Exponent of the power-law decay component (dimensionless).
    pub decay_alpha: f64,

    /// Normalized relevance at or above which a retrieved item is rehearsed.
    pub rehearsal_threshold: f64,

    /// Temporal score strictly below which an item becomes evictable.
    pub deletion_threshold: f64,

    /// Absolute age in days; strictly older items are evicted regardless of score.
    pub max_age_days: f64,

    /// Weight of normalized relevance in the combined retrieval score.
    pub retrieval_weight_relevance: f64,

    /// Weight of the temporal score in the combined retrieval score.
    pub retrieval_weight_temporal: f64,

    /// Additive importance increment applied on rehearsal.
    pub rehearsal_boost: f64,

    /// Upper clamp of importance.
    pub max_importance: f64,

    /// Lower clamp of importance.
    pub min_importance: f64,

    /// Divisor applied to raw BM25 scores before clamping to `[0, 1]`.
    pub relevance_normalization_scale: f64,

    /// Per-day exponent inside the recency bonus.
    pub recency_halving_rate: f64,

    /// Additive weight of the recency term in the temporal score.
    pub recency_weight: f64,

    /// Additive weight of the frequency term in the temporal score.
    pub frequency_weight: f64,

    /// Divisor applied to `log2(access_count + 1)`.
    pub frequency_scale: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            decay_lambda: 0.05,
            decay_alpha: 1.5,
            rehearsal_threshold: 0.7,
            deletion_threshold: 0.1,
            max_age_days: 365.0,
            retrieval_weight_relevance: 0.6,
            retrieval_weight_temporal: 0.4,
            rehearsal_boost: 0.05,
            max_importance: 1.0,
            min_importance: 0.0,
            relevance_normalization_scale: 10.0,
            recency_halving_rate: 0.1,
            recency_weight: 0.3,
            frequency_weight: 0.2,
            frequency_scale: 10.0,
        }
    }
}

impl TemporalConfig {
    /// Load from environment variables with defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("SMRITI_ENABLED") {
            config.enabled = val.to_lowercase() == "true" || val == "1";
        }

        read_f64("SMRITI_DECAY_LAMBDA", &mut config.decay_lambda);
        read_f64("SMRITI_DECAY_ALPHA", &mut config.decay_alpha);
        read_f64("SMRITI_REHEARSAL_THRESHOLD", &mut config.rehearsal_threshold);
        read_f64("SMRITI_DELETION_THRESHOLD", &mut config.deletion_threshold);
        read_f64("SMRITI_MAX_AGE_DAYS", &mut config.max_age_days);
        read_f64(
            "SMRITI_RETRIEVAL_WEIGHT_RELEVANCE",
            &mut config.retrieval_weight_relevance,
        );
        read_f64(
            "SMRITI_RETRIEVAL_WEIGHT_TEMPORAL",
            &mut config.retrieval_weight_temporal,
        );
        read_f64("SMRITI_REHEARSAL_BOOST", &mut config.rehearsal_boost);
        read_f64("SMRITI_MAX_IMPORTANCE", &mut config.max_importance);
        read_f64("SMRITI_MIN_IMPORTANCE", &mut config.min_importance);
        read_f64(
            "SMRITI_RELEVANCE_NORMALIZATION_SCALE",
            &mut config.relevance_normalization_scale,
        );
        read_f64(
            "SMRITI_RECENCY_HALVING_RATE",
            &mut config.recency_halving_rate,
        );
        read_f64("SMRITI_RECENCY_WEIGHT", &mut config.recency_weight);
        read_f64("SMRITI_FREQUENCY_WEIGHT", &mut config.frequency_weight);
        read_f64("SMRITI_FREQUENCY_SCALE", &mut config.frequency_scale);

        config
    }

    /// Validate the configuration. Called once at startup; the scoring engine
    /// assumes these constraints hold.
    pub fn validate(&self) -> Result<()> {
        if self.min_importance > self.max_importance {
            return Err(anyhow!(
                "min_importance ({}) must not exceed max_importance ({})",
                self.min_importance,
                self.max_importance
            ));
        }

        for (name, value) in [
            ("decay_lambda", self.decay_lambda),
            ("decay_alpha", self.decay_alpha),
            ("recency_halving_rate", self.recency_halving_rate),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(anyhow!("{name} must be a non-negative finite number"));
            }
            if self.enabled && value == 0.0 {
                return Err(anyhow!("{name} must be > 0 while temporal scoring is enabled"));
            }
        }

        for (name, value) in [
            ("retrieval_weight_relevance", self.retrieval_weight_relevance),
            ("retrieval_weight_temporal", self.retrieval_weight_temporal),
            ("recency_weight", self.recency_weight),
            ("frequency_weight", self.frequency_weight),
            ("rehearsal_boost", self.rehearsal_boost),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(anyhow!("{name} must be a non-negative finite number"));
            }
        }

        for (name, value) in [
            ("relevance_normalization_scale", self.relevance_normalization_scale),
            ("frequency_scale", self.frequency_scale),
            ("max_age_days", self.max_age_days),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(anyhow!("{name} must be a positive finite number"));
            }
        }

        for (name, value) in [
            ("rehearsal_threshold", self.rehearsal_threshold),
            ("deletion_threshold", self.deletion_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{name} must be between 0.0 and 1.0, got: {value}"));
            }
        }

        Ok(())
    }

    /// Clamp an importance score into the configured range.
    pub fn clamp_importance(&self, importance: f64) -> f64 {
        importance.clamp(self.min_importance, self.max_importance)
    }
}

/// Server configuration loaded from environment with defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server port (default: 3030)
    pub port: u16,

    /// SQLite database URL (default: sqlite:smriti_memory.db?mode=rwc)
    pub database_url: String,

    /// Maximum connections in the shared store pool (default: 10).
    /// Retrievals and the decay task share this pool.
    pub db_max_connections: u32,

    /// Maximum embedding dimension D_max; vectors are padded or truncated
    /// to this length on write (default: 384)
    pub embedding_dim: usize,

    /// Background decay cycle interval in seconds; 0 disables the scheduler
    /// (default: 3600)
    pub decay_interval_secs: u64,

    /// Batch size for scheduled decay cycles (default: 500)
    pub decay_batch_size: usize,

    /// Whether running in production mode
    pub is_production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            database_url: "sqlite:smriti_memory.db?mode=rwc".to_string(),
            db_max_connections: 10,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            decay_interval_secs: 3600,
            decay_batch_size: DECAY_DEFAULT_BATCH_SIZE,
            is_production: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.is_production = env::var("SMRITI_ENV")
            .map(|v| {
                let v = v.to_lowercase();
                v == "production" || v == "prod"
            })
            .unwrap_or(false);

        if let Ok(val) = env::var("SMRITI_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }

        if let Ok(val) = env::var("SMRITI_DATABASE_URL") {
            config.database_url = val;
        }

        if let Ok(val) = env::var("SMRITI_DB_MAX_CONNECTIONS") {
            if let Ok(n) = val.parse() {
                config.db_max_connections = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_EMBEDDING_DIM") {
            if let Ok(n) = val.parse() {
                config.embedding_dim = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_DECAY_INTERVAL") {
            if let Ok(n) = val.parse() {
                config.decay_interval_secs = n;
            }
        }

        if let Ok(val) = env::var("SMRITI_DECAY_BATCH_SIZE") {
            if let Ok(n) = val.parse() {
                config.decay_batch_size = n;
            }
        }

        config
    }

    /// Log the current configuration.
    pub fn log(&self, temporal: &TemporalConfig) {
        info!("Configuration:");
        info!(
            "   Mode: {}",
            if self.is_production {
                "PRODUCTION"
            } else {
                "Development"
            }
        );
        info!("   Port: {}", self.port);
        info!("   Database: {}", self.database_url);
        info!("   Pool size: {}", self.db_max_connections);
        info!("   Embedding dim (D_max): {}", self.embedding_dim);
        if self.decay_interval_secs == 0 {
            info!("   Decay scheduler: disabled");
        } else {
            info!(
                "   Decay scheduler: every {}s (batch {})",
                self.decay_interval_secs, self.decay_batch_size
            );
        }
        info!(
            "   Temporal scoring: {} (lambda={}, alpha={}, deletion<{}, max_age={}d)",
            if temporal.enabled { "enabled" } else { "disabled" },
            temporal.decay_lambda,
            temporal.decay_alpha,
            temporal.deletion_threshold,
            temporal.max_age_days
        );
    }
}

/// Recognized `SMRITI_*` environment variables.
const KNOWN_ENV_VARS: &[&str] = &[
    "SMRITI_ENABLED",
    "SMRITI_DECAY_LAMBDA",
    "SMRITI_DECAY_ALPHA",
    "SMRITI_REHEARSAL_THRESHOLD",
    "SMRITI_DELETION_THRESHOLD",
    "SMRITI_MAX_AGE_DAYS",
    "SMRITI_RETRIEVAL_WEIGHT_RELEVANCE",
    "SMRITI_RETRIEVAL_WEIGHT_TEMPORAL",
    "SMRITI_REHEARSAL_BOOST",
    "SMRITI_MAX_IMPORTANCE",
    "SMRITI_MIN_IMPORTANCE",
    "SMRITI_RELEVANCE_NORMALIZATION_SCALE",
    "SMRITI_RECENCY_HALVING_RATE",
    "SMRITI_RECENCY_WEIGHT",
    "SMRITI_FREQUENCY_WEIGHT",
    "SMRITI_FREQUENCY_SCALE",
    "SMRITI_ENV",
    "SMRITI_PORT",
    "SMRITI_DATABASE_URL",
    "SMRITI_DB_MAX_CONNECTIONS",
    "SMRITI_EMBEDDING_DIM",
    "SMRITI_DECAY_INTERVAL",
    "SMRITI_DECAY_BATCH_SIZE",
];

/// Warn about `SMRITI_*` variables that are set but not recognized.
/// Unknown variables are ignored.
pub fn warn_unknown_env() {
    for (key, _) in env::vars() {
        if key.starts_with("SMRITI_") && !KNOWN_ENV_VARS.contains(&key.as_str()) {
            warn!("Ignoring unknown configuration variable {key}");
        }
    }
}

fn read_f64(var: &str, target: &mut f64) {
    if let Ok(val) = env::var(var) {
        if let Ok(n) = val.parse() {
            *target = n;
        } else {
            warn!("Could not parse {var}={val} as a number, keeping default");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TemporalConfig::default();
        assert!(config.enabled);
        assert_eq!(config.decay_lambda, 0.05);
        assert_eq!(config.decay_alpha, 1.5);
        assert_eq!(config.rehearsal_threshold, 0.7);
        assert_eq!(config.deletion_threshold, 0.1);
        assert_eq!(config.max_age_days, 365.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("SMRITI_DECAY_LAMBDA", "0.2");
        env::set_var("SMRITI_DELETION_THRESHOLD", "0.25");

        let config = TemporalConfig::from_env();
        assert_eq!(config.decay_lambda, 0.2);
        assert_eq!(config.deletion_threshold, 0.25);

        env::remove_var("SMRITI_DECAY_LAMBDA");
        env::remove_var("SMRITI_DELETION_THRESHOLD");
    }

    #[test]
    fn test_zero_rate_rejected_when_enabled() {
        let config = TemporalConfig {
            decay_lambda: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TemporalConfig {
            enabled: false,
            decay_lambda: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_importance_range_rejected() {
        let config = TemporalConfig {
            min_importance: 0.9,
            max_importance: 0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_importance() {
        let config = TemporalConfig::default();
        assert_eq!(config.clamp_importance(1.7), 1.0);
        assert_eq!(config.clamp_importance(-0.3), 0.0);
        assert_eq!(config.clamp_importance(0.42), 0.42);
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3030);
        assert_eq!(config.embedding_dim, 384);
        assert!(!config.is_production);
    }
}
