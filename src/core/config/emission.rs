//! Caching emission model configuration.

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};
use super::parallel::ParallelPolicy;

/// Padding range, memory budget and parallelism for the caching emission model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Smallest number of blank columns that may follow a glyph.
    /// Default: 1
    #[serde(default = "EmissionConfig::default_pad_min_width")]
    pub pad_min_width: usize,

    /// Largest number of blank columns that may follow a glyph.
    /// Default: 5
    #[serde(default = "EmissionConfig::default_pad_max_width")]
    pub pad_max_width: usize,

    /// Cache size, in gigabytes, above which a rebuild logs a warning.
    /// Advisory only.
    /// Default: 16.0
    #[serde(default = "EmissionConfig::default_max_cache_memory_gb")]
    pub max_cache_memory_gb: f64,

    /// Worker configuration for cache rebuilds.
    #[serde(default)]
    pub parallel: ParallelPolicy,
}

impl EmissionConfig {
    /// Create a new EmissionConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inclusive padding width range.
    pub fn with_pad_widths(mut self, min: usize, max: usize) -> Self {
        self.pad_min_width = min;
        self.pad_max_width = max;
        self
    }

    /// Set the advisory cache memory budget.
    pub fn with_max_cache_memory_gb(mut self, budget_gb: f64) -> Self {
        self.max_cache_memory_gb = budget_gb;
        self
    }

    /// Set the parallel policy.
    pub fn with_parallel(mut self, parallel: ParallelPolicy) -> Self {
        self.parallel = parallel;
        self
    }

    /// Parses and validates a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, crate::core::OCRError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn default_pad_min_width() -> usize {
        1
    }

    fn default_pad_max_width() -> usize {
        5
    }

    fn default_max_cache_memory_gb() -> f64 {
        16.0
    }
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            pad_min_width: Self::default_pad_min_width(),
            pad_max_width: Self::default_pad_max_width(),
            max_cache_memory_gb: Self::default_max_cache_memory_gb(),
            parallel: ParallelPolicy::default(),
        }
    }
}

impl ConfigValidator for EmissionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_inclusive_range(self.pad_min_width, self.pad_max_width, "padding width")?;
        self.validate_memory_budget_gb(self.max_cache_memory_gb)?;
        self.parallel.validate()?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}
