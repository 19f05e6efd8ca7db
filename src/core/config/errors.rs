//! Configuration error types and validation traits.

use thiserror::Error;

/// Errors that can occur during configuration validation.
///
/// This enum represents the ways a model or cache configuration can be
/// rejected before any table is allocated.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Error indicating that validation failed.
    #[error("validation failed: {message}")]
    ValidationFailed { message: String },

    /// Error indicating that a resource limit has been exceeded.
    #[error("resource limit exceeded: {message}")]
    ResourceLimitExceeded { message: String },
}

/// A trait for validating configuration parameters.
///
/// Implementors call the helper validators from `validate` for each field
/// that carries a constraint.
pub trait ConfigValidator {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// A Result indicating success or a ConfigError if validation fails.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates that a float is finite and strictly positive.
    ///
    /// # Arguments
    ///
    /// * `value` - The value to validate.
    /// * `field_name` - The name of the field being validated.
    fn validate_positive_f64(&self, value: f64, field_name: &str) -> Result<(), ConfigError> {
        if !value.is_finite() || value <= 0.0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{} must be greater than 0, got {}", field_name, value),
            })
        } else {
            Ok(())
        }
    }

    /// Validates that a float is finite and not negative.
    fn validate_non_negative_f64(&self, value: f64, field_name: &str) -> Result<(), ConfigError> {
        if !value.is_finite() || value < 0.0 {
            Err(ConfigError::InvalidConfig {
                message: format!("{} must be at least 0, got {}", field_name, value),
            })
        } else {
            Ok(())
        }
    }

    /// Validates that `min <= max` for an inclusive integer range.
    ///
    /// # Arguments
    ///
    /// * `min` - Lower bound of the range.
    /// * `max` - Upper bound of the range.
    /// * `field_name` - The name of the range being validated.
    fn validate_inclusive_range(
        &self,
        min: usize,
        max: usize,
        field_name: &str,
    ) -> Result<(), ConfigError> {
        if min > max {
            Err(ConfigError::InvalidConfig {
                message: format!(
                    "{} range is empty: min {} is greater than max {}",
                    field_name, min, max
                ),
            })
        } else {
            Ok(())
        }
    }

    /// Validates an advisory memory budget in gigabytes.
    fn validate_memory_budget_gb(&self, budget_gb: f64) -> Result<(), ConfigError> {
        const MAX_REASONABLE_MEMORY_GB: f64 = 1024.0;

        if !budget_gb.is_finite() || budget_gb <= 0.0 {
            Err(ConfigError::InvalidConfig {
                message: format!("Memory budget must be greater than 0 GB, got {}", budget_gb),
            })
        } else if budget_gb > MAX_REASONABLE_MEMORY_GB {
            Err(ConfigError::ResourceLimitExceeded {
                message: format!(
                    "Memory budget {} GB exceeds reasonable maximum of {} GB",
                    budget_gb, MAX_REASONABLE_MEMORY_GB
                ),
            })
        } else {
            Ok(())
        }
    }

    /// Validates thread count.
    ///
    /// # Arguments
    ///
    /// * `thread_count` - The thread count to validate.
    fn validate_thread_count(&self, thread_count: usize) -> Result<(), ConfigError> {
        const MAX_REASONABLE_THREADS: usize = 256;

        if thread_count == 0 {
            Err(ConfigError::InvalidConfig {
                message: "Thread count must be greater than 0".to_string(),
            })
        } else if thread_count > MAX_REASONABLE_THREADS {
            Err(ConfigError::ResourceLimitExceeded {
                message: format!(
                    "Thread count {} exceeds reasonable maximum of {}",
                    thread_count, MAX_REASONABLE_THREADS
                ),
            })
        } else {
            Ok(())
        }
    }
}
