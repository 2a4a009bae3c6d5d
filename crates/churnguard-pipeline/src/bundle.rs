//! The artifact bundle a training run publishes
//!
//! Manifest, model and metrics travel as one value so they can never be
//! stored or loaded independently of each other.

use churnguard_core::{Error, ProfileWarning, Result};
use churnguard_features::FeatureManifest;
use churnguard_model::{EvaluationMetrics, ModelArtifact};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Current on-disk bundle layout
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Which rows the stored metrics were computed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationSet {
    Holdout,
    /// Holdout fraction was zero, metrics are in-sample
    Training,
}

/// Bookkeeping about the run that produced a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Records in the validated batch
    pub records: usize,
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub evaluated_on: EvaluationSet,

    /// Degenerate-field findings from batch profiling
    #[serde(default)]
    pub warnings: Vec<ProfileWarning>,
}

/// A paired `(manifest, model, metrics)` triple from one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub format_version: u32,
    pub run_id: String,
    pub trained_at: SystemTime,
    pub decision_threshold: f64,
    pub manifest: FeatureManifest,
    pub model: ModelArtifact,
    pub metrics: EvaluationMetrics,
    pub summary: TrainingSummary,
}

impl ArtifactBundle {
    /// Check the manifest fingerprint and the model/manifest pairing
    pub fn verify(&self) -> Result<()> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(Error::config(format!(
                "unsupported bundle format version {} (expected {BUNDLE_FORMAT_VERSION})",
                self.format_version
            )));
        }
        self.manifest.verify()?;
        self.model.verify_pairing(&self.manifest)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and verify a bundle
    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: Self = serde_json::from_str(json)?;
        bundle.verify()?;
        Ok(bundle)
    }
}
