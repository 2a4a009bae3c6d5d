//! Training configuration

use churnguard_core::{Error, Result};
use churnguard_features::EncoderConfig;
use churnguard_model::{LogisticConfig, DEFAULT_DECISION_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Share of records held out for evaluation
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,

    /// Seed for the train/holdout shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Churn probability at or above which the label is "likely to churn"
    #[serde(default = "default_threshold")]
    pub decision_threshold: f64,

    /// Encoding policy frozen into the manifest
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Classifier hyperparameters
    #[serde(default)]
    pub model: LogisticConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: default_holdout_fraction(),
            seed: default_seed(),
            decision_threshold: default_threshold(),
            encoder: EncoderConfig::default(),
            model: LogisticConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject settings no run could succeed with
    pub fn check(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(Error::config(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(Error::config(format!(
                "decision_threshold must be in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        Ok(())
    }
}

fn default_holdout_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_threshold() -> f64 {
    DEFAULT_DECISION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_config_yaml() {
        let yaml = r#"
holdout_fraction: 0.25
seed: 7
encoder:
  drop_first: true
model:
  epochs: 50
"#;
        let config = TrainingConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.holdout_fraction, 0.25);
        assert_eq!(config.seed, 7);
        assert_eq!(config.decision_threshold, DEFAULT_DECISION_THRESHOLD);
        assert!(config.encoder.drop_first);
        assert!(!config.encoder.clip_numeric);
        assert_eq!(config.model.epochs, 50);
        assert_eq!(config.model.l2, LogisticConfig::default().l2);
    }

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = TrainingConfig::from_yaml("{}").unwrap();
        assert_eq!(config, TrainingConfig::default());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(TrainingConfig::from_yaml("holdout_fraction: 1.0").is_err());
        assert!(TrainingConfig::from_yaml("decision_threshold: 1.5").is_err());
    }
}
