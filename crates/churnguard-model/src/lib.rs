//! ChurnGuard Model
//!
//! The classifier side of the churn service: a [`Classifier`] trait, a
//! deterministic logistic-regression implementation, the [`ModelArtifact`]
//! that pairs a trained model with its feature manifest, and holdout
//! evaluation metrics.

pub mod artifact;
pub mod classifier;
pub mod evaluation;
pub mod logistic;

pub use artifact::{ModelArtifact, ModelState};
pub use classifier::{ChurnLabel, Classifier, Trainer, DEFAULT_DECISION_THRESHOLD};
pub use evaluation::{ConfusionMatrix, EvaluationMetrics, HoldoutSplit};
pub use logistic::{LogisticConfig, LogisticRegression, LogisticTrainer};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifact::ModelArtifact;
    pub use crate::classifier::{ChurnLabel, Classifier, Trainer};
    pub use crate::evaluation::EvaluationMetrics;
}
