//! CLI configuration file

use churnguard_core::{SchemaConfig, SchemaRegistry};
use churnguard_pipeline::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `churnguard.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Schema YAML; the built-in telco schema when absent
    #[serde(default)]
    pub schema_path: Option<PathBuf>,

    /// Where the artifact bundle is published
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Training run settings
    #[serde(default)]
    pub training: TrainingConfig,
}

impl CliConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &Path, cli: &crate::Cli) -> anyhow::Result<Self> {
        // A missing file means defaults
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        if let Some(schema) = &cli.schema {
            config.schema_path = Some(schema.clone());
        }

        if let Some(artifacts) = &cli.artifacts {
            config.artifact_dir = artifacts.clone();
        }

        config.training.check()?;
        Ok(config)
    }

    /// Build the schema registry this configuration points at
    pub fn registry(&self) -> anyhow::Result<SchemaRegistry> {
        Ok(match &self.schema_path {
            Some(path) => SchemaConfig::from_file(path)?.into_registry()?,
            None => SchemaRegistry::telco()?,
        })
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            artifact_dir: default_artifact_dir(),
            training: TrainingConfig::default(),
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("./artifacts")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let cli = Cli::try_parse_from(["churnguard", "schema"]).unwrap();
        let config = CliConfig::load(Path::new("/nonexistent/churnguard.yaml"), &cli).unwrap();
        assert_eq!(config.training, TrainingConfig::default());
        assert!(config.registry().unwrap().describe("Contract").is_ok());
    }

    #[test]
    fn test_file_values_and_cli_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("churnguard.yaml");
        std::fs::write(
            &path,
            "artifact_dir: /srv/churn\ntraining:\n  seed: 9\n  encoder:\n    drop_first: true\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from(["churnguard", "inspect"]).unwrap();
        let config = CliConfig::load(&path, &cli).unwrap();
        assert_eq!(config.artifact_dir, PathBuf::from("/srv/churn"));
        assert_eq!(config.training.seed, 9);
        assert!(config.training.encoder.drop_first);

        let cli = Cli::try_parse_from(["churnguard", "inspect", "--artifacts", "elsewhere"]).unwrap();
        let config = CliConfig::load(&path, &cli).unwrap();
        assert_eq!(config.artifact_dir, PathBuf::from("elsewhere"));
    }

    #[test]
    fn test_invalid_training_section_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("churnguard.yaml");
        std::fs::write(&path, "training:\n  holdout_fraction: 2.0\n").unwrap();

        let cli = Cli::try_parse_from(["churnguard", "inspect"]).unwrap();
        assert!(CliConfig::load(&path, &cli).is_err());
    }
}
