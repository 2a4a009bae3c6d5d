//! Inference pipeline
//!
//! Serves predictions from one frozen `(manifest, model)` pair. Records are
//! validated against the registry the manifest implies, encoded with the
//! manifest as-is and scored. Nothing is ever refit from serving traffic.

use crate::bundle::ArtifactBundle;
use crate::telemetry::ServingMetrics;
use churnguard_core::{
    Error, FeatureVector, RawRecord, Result, ValidationMode, ValidationReport, Validator,
};
use churnguard_features::{Encoder, FeatureManifest};
use churnguard_model::{ChurnLabel, ModelArtifact};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Outcome of scoring one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: ChurnLabel,

    /// Churn probability in `[0, 1]`
    pub score: f64,

    /// Probability of the predicted label
    pub confidence: f64,
}

impl Prediction {
    fn from_score(score: f64, threshold: f64) -> Self {
        let label = ChurnLabel::from_probability(score, threshold);
        let confidence = if label.is_churn() { score } else { 1.0 - score };
        Self {
            label,
            score,
            confidence,
        }
    }
}

/// Scores raw records with a verified, immutable artifact pair
#[derive(Debug, Clone)]
pub struct InferencePipeline {
    manifest: Arc<FeatureManifest>,
    model: Arc<ModelArtifact>,
    validator: Validator,
    threshold: f64,
    metrics: ServingMetrics,
}

impl InferencePipeline {
    /// Pair a manifest with a model.
    ///
    /// Fails with `SchemaMismatch` before anything is scored if the model
    /// was not trained against this manifest.
    pub fn new(
        manifest: Arc<FeatureManifest>,
        model: Arc<ModelArtifact>,
        threshold: f64,
    ) -> Result<Self> {
        manifest.verify()?;
        model.verify_pairing(&manifest)?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!(
                "decision threshold must be in [0, 1], got {threshold}"
            )));
        }

        let registry = manifest.serving_registry()?;
        Ok(Self {
            validator: Validator::new(Arc::new(registry)),
            manifest,
            model,
            threshold,
            metrics: ServingMetrics::new(),
        })
    }

    /// Build from a stored training bundle
    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self> {
        bundle.verify()?;
        Self::new(
            Arc::new(bundle.manifest),
            Arc::new(bundle.model),
            bundle.decision_threshold,
        )
    }

    /// Report into an existing set of counters
    pub fn with_metrics(mut self, metrics: ServingMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Frozen manifest
    pub fn manifest(&self) -> &Arc<FeatureManifest> {
        &self.manifest
    }

    /// Paired model
    pub fn model(&self) -> &Arc<ModelArtifact> {
        &self.model
    }

    /// Decision threshold applied to churn probabilities
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Serving counters
    pub fn metrics(&self) -> &ServingMetrics {
        &self.metrics
    }

    /// Serving validator (registry narrowed to the manifest)
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validate in serving mode without scoring
    pub fn validate(&self, record: &RawRecord) -> ValidationReport {
        self.validator.validate(record, ValidationMode::ServingSingle)
    }

    /// Validate and encode a record with the frozen manifest
    pub fn transform(&self, record: &RawRecord) -> Result<FeatureVector> {
        self.validator.check_serving(record)?;
        Encoder::apply(record, &self.manifest)
    }

    /// Validate, encode and score one record
    pub fn predict(&self, record: &RawRecord) -> Result<Prediction> {
        let start = Instant::now();
        let outcome = self
            .transform(record)
            .and_then(|features| self.model.predict_proba(&features));

        match outcome {
            Ok(score) => {
                let prediction = Prediction::from_score(score, self.threshold);
                let latency_us = start.elapsed().as_micros() as u64;
                self.metrics
                    .record_prediction(prediction.label.is_churn(), latency_us);
                debug!(score, label = %prediction.label, latency_us, "prediction");
                Ok(prediction)
            }
            Err(e) => {
                match &e {
                    Error::Validation(_) => self.metrics.record_validation_rejection(),
                    Error::SchemaMismatch(_) => self.metrics.record_schema_mismatch(),
                    _ => {}
                }
                Err(e)
            }
        }
    }

    /// Score records independently in parallel; results keep input order
    pub fn predict_batch(&self, records: &[RawRecord]) -> Vec<Result<Prediction>> {
        records.par_iter().map(|record| self.predict(record)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::training::TrainingPipeline;
    use churnguard_core::fixtures::{sample_batch, sample_record};
    use churnguard_core::{FieldValue, SchemaRegistry, ViolationKind};

    fn trained() -> InferencePipeline {
        let pipeline = TrainingPipeline::new(
            Arc::new(SchemaRegistry::telco().unwrap()),
            TrainingConfig::default(),
        )
        .unwrap();
        InferencePipeline::from_bundle(pipeline.run(sample_batch(150)).unwrap()).unwrap()
    }

    #[test]
    fn test_predict_returns_consistent_label() {
        let inference = trained();
        let prediction = inference.predict(&sample_record()).unwrap();

        assert!((0.0..=1.0).contains(&prediction.score));
        assert!(prediction.confidence >= 0.5);
        assert_eq!(
            prediction.label,
            ChurnLabel::from_probability(prediction.score, inference.threshold())
        );
        assert_eq!(inference.metrics().snapshot().predictions, 1);
    }

    #[test]
    fn test_invalid_record_is_rejected_not_defaulted() {
        let inference = trained();
        let mut record = sample_record();
        record.remove("tenure");
        record.insert("Contract", FieldValue::from("Weekly"));

        let err = inference.predict(&record).unwrap_err();
        assert!(err.is_client_error());
        let report = err.validation_report().unwrap();
        assert_eq!(
            report.violated_fields().into_iter().collect::<Vec<_>>(),
            vec!["Contract", "tenure"]
        );
        assert!(report
            .violations()
            .iter()
            .any(|v| matches!(v.kind, ViolationKind::Missing)));

        let snapshot = inference.metrics().snapshot();
        assert_eq!(snapshot.validation_rejections, 1);
        assert_eq!(snapshot.predictions, 0);
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let inference = trained();
        let mut records: Vec<RawRecord> =
            sample_batch(12).into_iter().map(|r| r.record).collect();
        records[5].remove("gender");

        let results = inference.predict_batch(&records);
        assert_eq!(results.len(), 12);
        assert!(results[5].is_err());
        for (i, result) in results.iter().enumerate() {
            if i != 5 {
                let single = inference.predict(&records[i]).unwrap();
                assert_eq!(result.as_ref().unwrap(), &single);
            }
        }
    }

    #[test]
    fn test_threshold_is_checked() {
        let inference = trained();
        let err = InferencePipeline::new(
            Arc::clone(inference.manifest()),
            Arc::clone(inference.model()),
            1.5,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
