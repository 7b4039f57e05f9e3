//! Configuration.
//!
//! All settings have defaults, so an empty JSON object is a valid
//! configuration. Missing fields fall back to their defaults individually.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default quiet period before a search query is considered settled.
pub const DEFAULT_DEBOUNCE_MS: u64 = 3;

/// Default cap on queued re-entrant notification rounds per write.
pub const DEFAULT_MAX_REENTRANT_ROUNDS: usize = 100;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub search: SearchConfig,
}

impl Config {
    /// Parse and validate a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_reentrant_rounds == 0 {
            return Err(ConfigError::Invalid {
                field: "runtime.max_reentrant_rounds",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Settings for the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many times a signal may be re-notified because it was written
    /// during its own notification, before the remaining rounds are dropped.
    pub max_reentrant_rounds: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_reentrant_rounds: DEFAULT_MAX_REENTRANT_ROUNDS,
        }
    }
}

/// Settings for a search binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period, in milliseconds, before a query settles.
    pub debounce_ms: u64,

    /// Publish an empty result list when the query settles empty.
    pub clear_on_empty: bool,

    /// Shortest query (in characters, after trimming) that is sent to the
    /// provider. Shorter queries are treated as empty.
    pub min_query_len: usize,
}

impl SearchConfig {
    /// The debounce delay as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Builder-style override of the debounce delay.
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debounce_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            clear_on_empty: true,
            min_query_len: 1,
        }
    }
}
