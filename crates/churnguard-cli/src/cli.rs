//! Command-line interface definitions
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "churnguard")]
#[command(
    author,
    version,
    about = "Train, validate and serve telecom churn models with train/serve parity"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "churnguard.yaml")]
    pub config: PathBuf,

    /// Schema YAML file (defaults to the built-in telco schema)
    #[arg(short, long, global = true, env = "CHURNGUARD_SCHEMA")]
    pub schema: Option<PathBuf>,

    /// Directory holding the artifact bundle
    #[arg(short, long, global = true, env = "CHURNGUARD_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check records against the schema without training or scoring
    Validate {
        /// JSON array or JSON-lines file of customer records
        input: PathBuf,

        /// Validate against the stored manifest's serving schema instead
        #[arg(long)]
        serving: bool,
    },

    /// Fit a manifest and model from labeled records and publish the bundle
    Train {
        /// JSON array or JSON-lines file of records with a `Churn` label
        input: PathBuf,

        /// Share of records held out for evaluation
        #[arg(long)]
        holdout: Option<f64>,

        /// Seed for the train/holdout split
        #[arg(long)]
        seed: Option<u64>,

        /// Drop the first indicator column of every multi-category field
        #[arg(long)]
        drop_first: bool,

        /// Clip numeric fields to the range observed in training
        #[arg(long)]
        clip_numeric: bool,
    },

    /// Score records with the published bundle
    Predict {
        /// JSON array or JSON-lines file of customer records
        input: PathBuf,
    },

    /// Show the manifest, pairing and metrics of the published bundle
    Inspect {
        /// Print every manifest column
        #[arg(long)]
        columns: bool,
    },

    /// Print the active schema as YAML
    Schema,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "churnguard",
            "train",
            "data.jsonl",
            "--holdout",
            "0.3",
            "--artifacts",
            "out",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.artifacts, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Train { holdout, input, .. } => {
                assert_eq!(holdout, Some(0.3));
                assert_eq!(input, PathBuf::from("data.jsonl"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
