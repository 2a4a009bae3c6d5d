//! Training pipeline
//!
//! A run walks `Loaded → Validated → ManifestFit → Encoded → ModelFit →
//! Evaluated` in order. Any failure is reported as
//! [`Error::TrainingStage`] naming the stage, and nothing is returned or
//! published for a failed run.

use crate::bundle::{ArtifactBundle, EvaluationSet, TrainingSummary, BUNDLE_FORMAT_VERSION};
use crate::config::TrainingConfig;
use crate::loader::DataLoader;
use crate::store::ArtifactStore;
use churnguard_core::{
    Error, FeatureVector, LabeledRecord, Result, SchemaRegistry, TrainingStage, ValidatedBatch,
    Validator,
};
use churnguard_features::{Encoder, FeatureManifest};
use churnguard_model::{
    EvaluationMetrics, HoldoutSplit, LogisticTrainer, ModelArtifact, ModelState, Trainer,
};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};
use uuid::Uuid;

/// Enforces strictly sequential stage transitions for one run
#[derive(Debug)]
struct StageTracker {
    run_id: String,
    current: Option<TrainingStage>,
}

impl StageTracker {
    fn new(run_id: String) -> Self {
        Self {
            run_id,
            current: None,
        }
    }

    fn enter(&mut self, stage: TrainingStage) -> Result<()> {
        let expected = match self.current {
            None => Some(TrainingStage::Loaded),
            Some(current) => current.next(),
        };
        if expected != Some(stage) {
            return Err(Error::internal(format!(
                "illegal stage transition {:?} -> {stage}",
                self.current
            )));
        }
        self.current = Some(stage);
        info!(run_id = %self.run_id, stage = %stage, "training stage reached");
        Ok(())
    }

    /// Run `f` as `stage`, tagging any failure with the stage
    fn stage<T>(&mut self, stage: TrainingStage, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.enter(stage)?;
        f().map_err(|e| {
            warn!(run_id = %self.run_id, stage = %stage, error = %e, "training stage failed");
            Error::at_stage(stage, e)
        })
    }

    fn is_finished(&self) -> bool {
        self.current == Some(TrainingStage::Evaluated)
    }
}

/// Fits a paired feature manifest and model from labeled records
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    validator: Validator,
    config: TrainingConfig,
}

impl TrainingPipeline {
    /// Create a pipeline for a schema and training configuration
    pub fn new(registry: Arc<SchemaRegistry>, config: TrainingConfig) -> Result<Self> {
        config.check()?;
        Ok(Self {
            validator: Validator::new(registry),
            config,
        })
    }

    /// Training configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Validator used for the training batch
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Pull records from `loader` and run
    pub fn run_from(&self, loader: &dyn DataLoader) -> Result<ArtifactBundle> {
        info!(source = %loader.describe(), "loading training data");
        let loaded = loader.load();
        self.execute(loaded)
    }

    /// Run on records already in memory
    pub fn run(&self, records: Vec<LabeledRecord>) -> Result<ArtifactBundle> {
        self.execute(Ok(records))
    }

    /// Train, then save the bundle only if every stage succeeded
    pub fn train_and_publish(
        &self,
        loader: &dyn DataLoader,
        store: &dyn ArtifactStore,
    ) -> Result<ArtifactBundle> {
        let bundle = self.run_from(loader)?;
        store.save(&bundle)?;
        Ok(bundle)
    }

    fn execute(&self, loaded: Result<Vec<LabeledRecord>>) -> Result<ArtifactBundle> {
        let run_id = Uuid::new_v4().to_string();
        let mut tracker = StageTracker::new(run_id.clone());

        let records = tracker.stage(TrainingStage::Loaded, || {
            let records = loaded?;
            if records.is_empty() {
                return Err(Error::config("loader returned no records"));
            }
            Ok(records)
        })?;

        let batch = tracker.stage(TrainingStage::Validated, || {
            ValidatedBatch::new(&self.validator, records)
        })?;

        let manifest = tracker.stage(TrainingStage::ManifestFit, || {
            Encoder::new(self.config.encoder).fit(&batch)
        })?;

        let (rows, labels) = tracker.stage(TrainingStage::Encoded, || {
            let rows = Encoder::apply_batch(batch.records().iter().map(|r| &r.record), &manifest)?;
            let labels: Vec<bool> = batch.records().iter().map(|r| r.churned).collect();
            Ok((rows, labels))
        })?;

        let (model, split) = tracker.stage(TrainingStage::ModelFit, || {
            let split =
                HoldoutSplit::new(rows.len(), self.config.holdout_fraction, self.config.seed)?;
            let (train_x, train_y) = select(&rows, &labels, &split.train);
            let trained = LogisticTrainer::new(self.config.model).train(&train_x, &train_y)?;
            let model = ModelArtifact::new(ModelState::LogisticRegression(trained), &manifest)?;
            Ok((model, split))
        })?;

        let (metrics, evaluated_on) = tracker.stage(TrainingStage::Evaluated, || {
            self.evaluate(&model, &manifest, &rows, &labels, &split)
        })?;

        if !tracker.is_finished() {
            return Err(Error::at_stage(
                TrainingStage::Evaluated,
                Error::internal("training run ended before evaluation"),
            ));
        }

        let bundle = ArtifactBundle {
            format_version: BUNDLE_FORMAT_VERSION,
            run_id,
            trained_at: SystemTime::now(),
            decision_threshold: self.config.decision_threshold,
            summary: TrainingSummary {
                records: batch.len(),
                train_rows: split.train.len(),
                holdout_rows: split.holdout.len(),
                evaluated_on,
                warnings: batch.profile().warnings().to_vec(),
            },
            manifest,
            model,
            metrics,
        };
        let bundle = seal(bundle)?;

        info!(
            run_id = %bundle.run_id,
            fingerprint = bundle.manifest.fingerprint(),
            columns = bundle.manifest.width(),
            accuracy = bundle.metrics.accuracy,
            roc_auc = ?bundle.metrics.roc_auc,
            "training run complete"
        );
        Ok(bundle)
    }

    fn evaluate(
        &self,
        model: &ModelArtifact,
        manifest: &FeatureManifest,
        rows: &[FeatureVector],
        labels: &[bool],
        split: &HoldoutSplit,
    ) -> Result<(EvaluationMetrics, EvaluationSet)> {
        model.verify_pairing(manifest)?;
        let (indices, set) = if split.holdout.is_empty() {
            (&split.train, EvaluationSet::Training)
        } else {
            (&split.holdout, EvaluationSet::Holdout)
        };

        let (x, y) = select(rows, labels, indices);
        let probabilities = x
            .iter()
            .map(|row| model.predict_proba(row))
            .collect::<Result<Vec<f64>>>()?;
        let metrics =
            EvaluationMetrics::compute(&probabilities, &y, self.config.decision_threshold)?;
        Ok((metrics, set))
    }
}

/// Final pairing check before a bundle leaves the run, reported against the
/// last stage
fn seal(bundle: ArtifactBundle) -> Result<ArtifactBundle> {
    bundle
        .verify()
        .map_err(|e| Error::at_stage(TrainingStage::Evaluated, e))?;
    Ok(bundle)
}

fn select(
    rows: &[FeatureVector],
    labels: &[bool],
    indices: &[usize],
) -> (Vec<FeatureVector>, Vec<bool>) {
    indices.iter().map(|&i| (rows[i].clone(), labels[i])).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::InMemoryLoader;
    use crate::store::MemoryArtifactStore;
    use churnguard_core::fixtures::sample_batch;
    use churnguard_core::FieldValue;

    fn pipeline(config: TrainingConfig) -> TrainingPipeline {
        TrainingPipeline::new(Arc::new(SchemaRegistry::telco().unwrap()), config).unwrap()
    }

    #[test]
    fn test_run_produces_paired_bundle() {
        let bundle = pipeline(TrainingConfig::default()).run(sample_batch(200)).unwrap();

        bundle.verify().unwrap();
        assert_eq!(bundle.model.manifest_fingerprint(), bundle.manifest.fingerprint());
        assert_eq!(bundle.summary.records, 200);
        assert_eq!(bundle.summary.holdout_rows, 40);
        assert_eq!(bundle.summary.train_rows, 160);
        assert_eq!(bundle.summary.evaluated_on, EvaluationSet::Holdout);
        assert_eq!(bundle.metrics.support, 40);
        assert!(bundle.metrics.accuracy > 0.6, "{:?}", bundle.metrics);
    }

    #[test]
    fn test_zero_holdout_evaluates_in_sample() {
        let config = TrainingConfig {
            holdout_fraction: 0.0,
            ..TrainingConfig::default()
        };
        let bundle = pipeline(config).run(sample_batch(60)).unwrap();
        assert_eq!(bundle.summary.evaluated_on, EvaluationSet::Training);
        assert_eq!(bundle.metrics.support, 60);
    }

    #[test]
    fn test_manifest_is_deterministic_across_runs() {
        let p = pipeline(TrainingConfig::default());
        let a = p.run(sample_batch(80)).unwrap();
        let b = p.run(sample_batch(80)).unwrap();
        assert_eq!(a.manifest.fingerprint(), b.manifest.fingerprint());
        assert_eq!(a.model, b.model);
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_validation_failure_names_stage() {
        let mut records = sample_batch(20);
        records[3].record.insert("Contract", FieldValue::from("Weekly"));

        let err = pipeline(TrainingConfig::default()).run(records).unwrap_err();
        match &err {
            Error::TrainingStage { stage, .. } => assert_eq!(*stage, TrainingStage::Validated),
            other => panic!("unexpected error {other:?}"),
        }
        let report = err.validation_report().unwrap();
        assert_eq!(report.violations()[0].record, Some(3));
    }

    #[test]
    fn test_empty_load_fails_at_loaded_stage() {
        let err = pipeline(TrainingConfig::default()).run(Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::TrainingStage {
                stage: TrainingStage::Loaded,
                ..
            }
        ));
    }

    #[test]
    fn test_single_class_fails_at_model_fit_and_publishes_nothing() {
        let records: Vec<_> = sample_batch(40)
            .into_iter()
            .map(|mut r| {
                r.churned = false;
                r
            })
            .collect();
        let store = MemoryArtifactStore::new();

        let err = pipeline(TrainingConfig::default())
            .train_and_publish(&InMemoryLoader::new(records), &store)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::TrainingStage {
                stage: TrainingStage::ModelFit,
                ..
            }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_final_check_names_evaluated_stage() {
        let mut bundle = pipeline(TrainingConfig::default()).run(sample_batch(60)).unwrap();
        bundle.format_version += 1;

        let err = seal(bundle).unwrap_err();
        match &err {
            Error::TrainingStage { stage, source } => {
                assert_eq!(*stage, TrainingStage::Evaluated);
                assert!(matches!(**source, Error::Config(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_tracker_rejects_skipped_stage() {
        let mut tracker = StageTracker::new("t".into());
        tracker.enter(TrainingStage::Loaded).unwrap();
        assert!(tracker.enter(TrainingStage::ManifestFit).is_err());
        tracker.enter(TrainingStage::Validated).unwrap();
        assert!(!tracker.is_finished());
    }
}
