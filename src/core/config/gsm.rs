//! Glyph substitution model configuration.

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, ConfigValidator};

/// Smoothing and sharpening parameters for the glyph substitution model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsmConfig {
    /// Pseudo-count added to every allowed (language, lm char, glyph) cell.
    /// Default: 0.01
    #[serde(default = "GsmConfig::default_smoothing_count")]
    pub smoothing_count: f64,

    /// Multiplier on `smoothing_count` for elision-tilde, tilde-elided,
    /// first-elided and diacritic-stripping cells.
    /// Default: 100.0
    #[serde(default = "GsmConfig::default_elision_smoothing_multiplier")]
    pub elision_smoothing_multiplier: f64,

    /// Exponent applied to probabilities at query time.
    /// Default: 4.0
    #[serde(default = "GsmConfig::default_gsm_power")]
    pub gsm_power: f64,

    /// Unsmoothed count below which a cell is dropped from the evaluation model.
    /// Values below 1 disable pruning.
    /// Default: 2.0
    #[serde(default = "GsmConfig::default_min_count_for_eval")]
    pub min_count_for_eval: f64,
}

impl GsmConfig {
    /// Create a new GsmConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the smoothing pseudo-count.
    pub fn with_smoothing_count(mut self, smoothing_count: f64) -> Self {
        self.smoothing_count = smoothing_count;
        self
    }

    /// Set the elision smoothing multiplier.
    pub fn with_elision_smoothing_multiplier(mut self, multiplier: f64) -> Self {
        self.elision_smoothing_multiplier = multiplier;
        self
    }

    /// Set the query-time power.
    pub fn with_gsm_power(mut self, gsm_power: f64) -> Self {
        self.gsm_power = gsm_power;
        self
    }

    /// Set the evaluation pruning threshold.
    pub fn with_min_count_for_eval(mut self, min_count: f64) -> Self {
        self.min_count_for_eval = min_count;
        self
    }

    /// Parses and validates a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, crate::core::OCRError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn default_smoothing_count() -> f64 {
        1e-2
    }

    fn default_elision_smoothing_multiplier() -> f64 {
        100.0
    }

    fn default_gsm_power() -> f64 {
        4.0
    }

    fn default_min_count_for_eval() -> f64 {
        2.0
    }
}

impl Default for GsmConfig {
    fn default() -> Self {
        Self {
            smoothing_count: Self::default_smoothing_count(),
            elision_smoothing_multiplier: Self::default_elision_smoothing_multiplier(),
            gsm_power: Self::default_gsm_power(),
            min_count_for_eval: Self::default_min_count_for_eval(),
        }
    }
}

impl ConfigValidator for GsmConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.validate_positive_f64(self.smoothing_count, "smoothing_count")?;
        self.validate_positive_f64(
            self.elision_smoothing_multiplier,
            "elision_smoothing_multiplier",
        )?;
        self.validate_positive_f64(self.gsm_power, "gsm_power")?;
        self.validate_non_negative_f64(self.min_count_for_eval, "min_count_for_eval")?;
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(GsmConfig::default().validate().is_ok());
    }

    #[test]
    fn test_non_positive_smoothing_rejected() {
        let config = GsmConfig::new().with_smoothing_count(0.0);
        assert!(config.validate().is_err());
        let config = GsmConfig::new().with_elision_smoothing_multiplier(-2.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fractional_power_allowed() {
        let config = GsmConfig::new().with_gsm_power(0.5);
        assert!(config.validate().is_ok());
        let config = GsmConfig::new().with_gsm_power(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_str() {
        let config =
            GsmConfig::from_json_str(r#"{"smoothing_count": 0.1, "gsm_power": 2.0}"#).unwrap();
        assert_eq!(config.smoothing_count, 0.1);
        assert_eq!(config.gsm_power, 2.0);
        assert_eq!(config.elision_smoothing_multiplier, 100.0);

        assert!(GsmConfig::from_json_str(r#"{"gsm_power": -1.0}"#).is_err());
        assert!(GsmConfig::from_json_str("not json").is_err());
    }
}
