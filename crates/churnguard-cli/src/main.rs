//! ChurnGuard CLI
//!
//! Validates customer records, trains paired (manifest, model) bundles and
//! scores records with the published bundle.

use anyhow::{Context, Result};
use clap::Parser;
use churnguard_core::{SchemaConfig, ValidationMode, Validator};
use churnguard_pipeline::{
    ArtifactStore, FsArtifactStore, InferencePipeline, TrainingConfig, TrainingPipeline,
};
use serde_json::json;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;
mod config;
mod input;

pub use cli::{Cli, Commands};
use config::CliConfig;
use input::{read_records, JsonLinesLoader};

/// Exit code when input records fail validation
const EXIT_INVALID_INPUT: u8 = 2;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);
    churnguard_pipeline::describe_metrics();

    let config = CliConfig::load(&cli.config, &cli)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match &cli.command {
        Commands::Validate { input, serving } => validate(&config, input, *serving),
        Commands::Train {
            input,
            holdout,
            seed,
            drop_first,
            clip_numeric,
        } => {
            let mut training = config.training.clone();
            if let Some(holdout) = holdout {
                training.holdout_fraction = *holdout;
            }
            if let Some(seed) = seed {
                training.seed = *seed;
            }
            training.encoder.drop_first |= *drop_first;
            training.encoder.clip_numeric |= *clip_numeric;
            train(&config, training, input)
        }
        Commands::Predict { input } => predict(&config, input),
        Commands::Inspect { columns } => inspect(&config, *columns),
        Commands::Schema => schema(&config),
    }
}

fn validate(config: &CliConfig, input: &Path, serving: bool) -> Result<ExitCode> {
    let registry = if serving {
        let bundle = FsArtifactStore::new(&config.artifact_dir).load()?;
        bundle.manifest.serving_registry()?
    } else {
        config.registry()?
    };
    let validator = Validator::new(Arc::new(registry));

    let records = read_records(input).with_context(|| format!("reading {}", input.display()))?;
    let mode = if serving {
        ValidationMode::ServingSingle
    } else {
        ValidationMode::TrainingBatch
    };

    let mut rejected = 0usize;
    for (i, record) in records.iter().enumerate() {
        let report = validator.validate(record, mode);
        if !report.is_valid() {
            rejected += 1;
            println!(
                "{}",
                json!({ "record": i, "violations": report.violations() })
            );
        }
    }

    info!(total = records.len(), rejected, "validation finished");
    if rejected > 0 {
        warn!("{rejected} of {} records failed validation", records.len());
        return Ok(ExitCode::from(EXIT_INVALID_INPUT));
    }
    Ok(ExitCode::SUCCESS)
}

fn train(
    config: &CliConfig,
    training: TrainingConfig,
    input: &Path,
) -> Result<ExitCode> {
    let registry = Arc::new(config.registry()?);
    let pipeline = TrainingPipeline::new(registry, training)?;
    let store = FsArtifactStore::new(&config.artifact_dir);

    let bundle = match pipeline.train_and_publish(&JsonLinesLoader::new(input), &store) {
        Ok(bundle) => bundle,
        Err(e) if e.validation_report().is_some() => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "run_id": bundle.run_id,
            "fingerprint": bundle.manifest.fingerprint(),
            "columns": bundle.manifest.width(),
            "summary": bundle.summary,
            "metrics": bundle.metrics,
            "bundle": store.bundle_path(),
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

fn predict(config: &CliConfig, input: &Path) -> Result<ExitCode> {
    let bundle = FsArtifactStore::new(&config.artifact_dir)
        .load()
        .with_context(|| format!("loading bundle from {}", config.artifact_dir.display()))?;
    let pipeline = InferencePipeline::from_bundle(bundle)?;

    let records = read_records(input).with_context(|| format!("reading {}", input.display()))?;
    let results = pipeline.predict_batch(&records);

    let mut rejected = 0usize;
    for (i, result) in results.into_iter().enumerate() {
        let line = match result {
            Ok(prediction) => json!({
                "record": i,
                "label": prediction.label.to_string(),
                "score": prediction.score,
                "confidence": prediction.confidence,
            }),
            Err(e) => match e.validation_report() {
                Some(report) => {
                    rejected += 1;
                    json!({ "record": i, "violations": report.violations() })
                }
                // Pairing and encoding failures are never per-record noise.
                None => return Err(e.into()),
            },
        };
        println!("{line}");
    }

    let snapshot = pipeline.metrics().snapshot();
    info!(
        predictions = snapshot.predictions,
        rejections = snapshot.validation_rejections,
        avg_latency_us = snapshot.avg_latency_us(),
        "prediction finished"
    );
    if rejected > 0 {
        return Ok(ExitCode::from(EXIT_INVALID_INPUT));
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(config: &CliConfig, columns: bool) -> Result<ExitCode> {
    let store = FsArtifactStore::new(&config.artifact_dir);
    let bundle = store
        .load()
        .with_context(|| format!("loading {}", store.bundle_path().display()))?;
    let manifest = &bundle.manifest;

    let mut report = json!({
        "run_id": bundle.run_id,
        "trained_at": bundle.trained_at,
        "schema_version": manifest.schema_version(),
        "fingerprint": manifest.fingerprint(),
        "model_fingerprint": bundle.model.manifest_fingerprint(),
        "algorithm": bundle.model.algorithm(),
        "policy": manifest.policy(),
        "width": manifest.width(),
        "columns_by_kind": manifest.kind_counts(),
        "decision_threshold": bundle.decision_threshold,
        "metrics": bundle.metrics,
        "summary": bundle.summary,
    });
    if columns {
        report["columns"] = json!(manifest.columns());
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

fn schema(config: &CliConfig) -> Result<ExitCode> {
    let registry = config.registry()?;
    let yaml = serde_yaml::to_string(&SchemaConfig::from_registry(&registry))?;
    print!("{yaml}");
    Ok(ExitCode::SUCCESS)
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("churnguard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("churnguard=info"))
    };

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
