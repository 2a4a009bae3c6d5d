//! Trained model artifacts, always paired with a feature manifest

use crate::classifier::Classifier;
use crate::logistic::LogisticRegression;
use churnguard_core::{Error, FeatureVector, Result};
use churnguard_features::FeatureManifest;
use serde::{Deserialize, Serialize};

/// Trained classifier state, tagged by algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ModelState {
    LogisticRegression(LogisticRegression),
}

impl ModelState {
    fn classifier(&self) -> &dyn Classifier {
        match self {
            Self::LogisticRegression(model) => model,
        }
    }

    /// Fail unless the trained parameters are internally consistent
    pub fn check(&self) -> Result<()> {
        match self {
            Self::LogisticRegression(model) => model.check(),
        }
    }
}

/// A trained classifier plus the fingerprint of the manifest that produced
/// its training features.
///
/// The artifact refuses to score anything until it has been checked against
/// a manifest with [`ModelArtifact::verify_pairing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    manifest_fingerprint: String,
    input_width: usize,
    state: ModelState,
}

impl ModelArtifact {
    /// Package a trained model with the manifest it was trained against
    pub fn new(state: ModelState, manifest: &FeatureManifest) -> Result<Self> {
        state.check()?;
        let input_width = state.classifier().input_width();
        if input_width != manifest.width() {
            return Err(Error::schema_mismatch(format!(
                "model trained on {input_width} features but manifest has {} columns",
                manifest.width()
            )));
        }
        Ok(Self {
            manifest_fingerprint: manifest.fingerprint().to_string(),
            input_width,
            state,
        })
    }

    /// Fingerprint of the manifest this model must be used with
    pub fn manifest_fingerprint(&self) -> &str {
        &self.manifest_fingerprint
    }

    /// Feature width the model expects
    pub fn input_width(&self) -> usize {
        self.input_width
    }

    /// Algorithm name
    pub fn algorithm(&self) -> &str {
        self.state.classifier().name()
    }

    /// Trained state
    pub fn state(&self) -> &ModelState {
        &self.state
    }

    /// Fail with `SchemaMismatch` unless `manifest` is the one this model was
    /// trained with. Inconsistent model state fails here too.
    pub fn verify_pairing(&self, manifest: &FeatureManifest) -> Result<()> {
        self.state.check()?;
        if manifest.fingerprint() != self.manifest_fingerprint {
            return Err(Error::schema_mismatch(format!(
                "model expects manifest {} but was given {}",
                self.manifest_fingerprint,
                manifest.fingerprint()
            )));
        }
        if manifest.width() != self.input_width
            || self.state.classifier().input_width() != self.input_width
        {
            return Err(Error::schema_mismatch(format!(
                "model expects {} features but manifest has {} columns",
                self.input_width,
                manifest.width()
            )));
        }
        Ok(())
    }

    /// Churn probability for an encoded row
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.input_width {
            return Err(Error::schema_mismatch(format!(
                "model expects {} features, got {}",
                self.input_width,
                features.len()
            )));
        }
        self.state.classifier().predict_proba(features)
    }
}
