//! Configuration for the extraction run

use crate::schema::DEFAULT_SCHEMA_FIELDS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for batch extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Number of priority documents in the trial batch
    pub first_batch_size: usize,

    /// Priority documents at positions below this limit form the
    /// priority batch; the rest join the general batch
    pub in_scope_limit: usize,

    /// Maximum model-call attempts per document
    pub max_retries: u32,

    /// Pause after each document that reached the model (seconds)
    pub sleep_secs: f64,

    /// Skip general documents entirely
    pub only_priority: bool,

    /// Top-level schema fields forwarded into prompts
    pub schema_fields: Vec<String>,

    /// Output hint appended to prompts instead of the vendor default
    pub json_hint: Option<String>,
}

impl ExtractorConfig {
    /// Pause between documents as a Duration
    pub fn sleep(&self) -> Duration {
        Duration::try_from_secs_f64(self.sleep_secs).unwrap_or(Duration::ZERO)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.in_scope_limit < self.first_batch_size {
            return Err(format!(
                "in_scope_limit ({}) must be at least first_batch_size ({})",
                self.in_scope_limit, self.first_batch_size
            ));
        }
        if self.max_retries == 0 {
            return Err("max_retries must be greater than 0".to_string());
        }
        if !self.sleep_secs.is_finite() || self.sleep_secs < 0.0 {
            return Err(format!(
                "sleep_secs must be a finite, non-negative number (got {})",
                self.sleep_secs
            ));
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            first_batch_size: 10,
            in_scope_limit: 50,
            max_retries: 3,
            sleep_secs: 1.0,
            only_priority: false,
            schema_fields: DEFAULT_SCHEMA_FIELDS.iter().map(|f| f.to_string()).collect(),
            json_hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sleep(), Duration::from_secs(1));
    }

    #[test]
    fn test_in_scope_limit_below_first_batch() {
        let config = ExtractorConfig {
            first_batch_size: 20,
            in_scope_limit: 10,
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = ExtractorConfig {
            max_retries: 0,
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_sleep_rejected() {
        for sleep_secs in [-1.0, f64::NAN, f64::INFINITY] {
            let config = ExtractorConfig {
                sleep_secs,
                ..ExtractorConfig::default()
            };
            assert!(config.validate().is_err(), "sleep_secs {} accepted", sleep_secs);
        }
    }

    #[test]
    fn test_zero_sleep_allowed() {
        let config = ExtractorConfig {
            sleep_secs: 0.0,
            ..ExtractorConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.sleep(), Duration::ZERO);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ExtractorConfig::from_toml("first_batch_size = 2\nonly_priority = true\n").unwrap();
        assert_eq!(config.first_batch_size, 2);
        assert!(config.only_priority);
        assert_eq!(config.in_scope_limit, 50);
        assert_eq!(config.schema_fields, vec!["entity_types", "relation_types"]);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig {
            json_hint: Some("json only".to_string()),
            ..ExtractorConfig::default()
        };
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }
}
