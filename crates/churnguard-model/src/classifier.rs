//! Classifier trait and common types

use churnguard_core::{FeatureVector, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default probability above which a customer is labeled as likely to churn
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

/// Trait for all trained churn classifiers
pub trait Classifier: Send + Sync {
    /// Probability that the customer churns, in `[0, 1]`
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64>;

    /// Number of feature columns the classifier was trained on
    fn input_width(&self) -> usize;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Trait for algorithms that produce a classifier from encoded training data
pub trait Trainer {
    /// Classifier produced by this trainer
    type Model: Classifier;

    /// Fit on encoded rows and their churn labels
    fn train(&self, features: &[FeatureVector], labels: &[bool]) -> Result<Self::Model>;
}

/// Categorical prediction outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurnLabel {
    LikelyToChurn,
    NotLikelyToChurn,
}

impl ChurnLabel {
    /// Apply a decision threshold to a churn probability
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Self::LikelyToChurn
        } else {
            Self::NotLikelyToChurn
        }
    }

    /// Whether this label predicts churn
    pub fn is_churn(self) -> bool {
        self == Self::LikelyToChurn
    }
}

impl fmt::Display for ChurnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LikelyToChurn => "likely to churn",
            Self::NotLikelyToChurn => "not likely to churn",
        })
    }
}
