//! Free-function entry points for serving and UI layers
//!
//! Thin wrappers over the pipelines for callers that hold artifacts
//! themselves instead of an [`ActiveArtifacts`](crate::ActiveArtifacts).

use crate::bundle::ArtifactBundle;
use crate::config::TrainingConfig;
use crate::inference::{InferencePipeline, Prediction};
use crate::training::TrainingPipeline;
use churnguard_core::{
    FeatureVector, LabeledRecord, RawRecord, Result, SchemaRegistry, ValidatedBatch,
    ValidationMode, ValidationReport, Validator,
};
use churnguard_features::{Encoder, EncoderConfig, FeatureManifest};
use churnguard_model::{ModelArtifact, DEFAULT_DECISION_THRESHOLD};
use std::sync::Arc;

/// Validate one serving record against a registry
pub fn validate(record: &RawRecord, registry: &Arc<SchemaRegistry>) -> ValidationReport {
    Validator::new(Arc::clone(registry)).validate(record, ValidationMode::ServingSingle)
}

/// Validate a labeled batch and fit a manifest from it
pub fn fit_manifest(
    records: Vec<LabeledRecord>,
    registry: &Arc<SchemaRegistry>,
    config: EncoderConfig,
) -> Result<FeatureManifest> {
    let validator = Validator::new(Arc::clone(registry));
    let batch = ValidatedBatch::new(&validator, records)?;
    Encoder::new(config).fit(&batch)
}

/// Validate against the manifest's serving schema, then encode
pub fn transform(record: &RawRecord, manifest: &FeatureManifest) -> Result<FeatureVector> {
    let validator = Validator::new(Arc::new(manifest.serving_registry()?));
    validator.check_serving(record)?;
    Encoder::apply(record, manifest)
}

/// Run a full training pipeline
pub fn train(
    records: Vec<LabeledRecord>,
    registry: &Arc<SchemaRegistry>,
    config: TrainingConfig,
) -> Result<ArtifactBundle> {
    TrainingPipeline::new(Arc::clone(registry), config)?.run(records)
}

/// Score one record with an explicit pair at the default threshold
pub fn predict(
    record: &RawRecord,
    manifest: &Arc<FeatureManifest>,
    model: &Arc<ModelArtifact>,
) -> Result<Prediction> {
    InferencePipeline::new(
        Arc::clone(manifest),
        Arc::clone(model),
        DEFAULT_DECISION_THRESHOLD,
    )?
    .predict(record)
}
