//! L2-regularised logistic regression
//!
//! Features are standardised with statistics from the training rows; those
//! statistics are part of the model state so scoring applies exactly the same
//! scaling. Training is full-batch gradient descent from zero weights, which
//! makes it fully deterministic for a given input.

use crate::classifier::{Classifier, Trainer};
use churnguard_core::{Error, FeatureVector, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hyperparameters for [`LogisticTrainer`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// Gradient descent step size
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Number of full passes over the training rows
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// L2 penalty on weights (not the bias)
    #[serde(default = "default_l2")]
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
        }
    }
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_epochs() -> usize {
    400
}

fn default_l2() -> f64 {
    1e-3
}

/// Trained logistic regression state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl LogisticRegression {
    /// Learned weights, one per (standardised) feature column
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Learned intercept
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Fail unless the state can score rows: weight, mean and scale vectors
    /// of equal length, finite parameters and strictly positive scales
    pub fn check(&self) -> Result<()> {
        let width = self.weights.len();
        if self.means.len() != width || self.scales.len() != width {
            return Err(Error::schema_mismatch(format!(
                "logistic regression has {width} weights but {} means and {} scales",
                self.means.len(),
                self.scales.len()
            )));
        }
        let finite = self.bias.is_finite()
            && self.weights.iter().chain(&self.means).all(|v| v.is_finite());
        if !finite {
            return Err(Error::model("logistic regression has non-finite parameters"));
        }
        if let Some(i) = self.scales.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(Error::model(format!(
                "logistic regression scale {i} is {}, expected a positive finite value",
                self.scales[i]
            )));
        }
        Ok(())
    }

    fn logit(&self, x: &[f64]) -> f64 {
        x.iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.weights)
            .map(|(((v, m), s), w)| w * (v - m) / s)
            .sum::<f64>()
            + self.bias
    }
}

impl Classifier for LogisticRegression {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        if features.len() != self.weights.len() {
            return Err(Error::schema_mismatch(format!(
                "classifier expects {} features, got {}",
                self.weights.len(),
                features.len()
            )));
        }
        Ok(sigmoid(self.logit(features.as_slice())))
    }

    fn input_width(&self) -> usize {
        self.weights.len()
    }

    fn name(&self) -> &str {
        "logistic_regression"
    }
}

/// Fits [`LogisticRegression`] models
#[derive(Debug, Clone, Default)]
pub struct LogisticTrainer {
    config: LogisticConfig,
}

impl LogisticTrainer {
    /// Create a trainer with the given hyperparameters
    pub fn new(config: LogisticConfig) -> Self {
        Self { config }
    }
}

impl Trainer for LogisticTrainer {
    type Model = LogisticRegression;

    fn train(&self, features: &[FeatureVector], labels: &[bool]) -> Result<LogisticRegression> {
        let width = check_training_data(features, labels)?;
        let config = &self.config;
        if !(config.learning_rate > 0.0) || config.epochs == 0 || config.l2 < 0.0 {
            return Err(Error::config(format!("invalid logistic config {config:?}")));
        }

        let (means, scales) = standardisation(features, width);
        let rows: Vec<Vec<f64>> = features
            .iter()
            .map(|f| {
                f.as_slice()
                    .iter()
                    .zip(&means)
                    .zip(&scales)
                    .map(|((v, m), s)| (v - m) / s)
                    .collect()
            })
            .collect();
        let targets: Vec<f64> = labels.iter().map(|&y| if y { 1.0 } else { 0.0 }).collect();
        let n = rows.len() as f64;

        let mut weights = vec![0.0; width];
        let mut bias = 0.0;
        let mut grad = vec![0.0; width];

        for epoch in 0..config.epochs {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_bias = 0.0;

            for (row, target) in rows.iter().zip(&targets) {
                let z = row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() + bias;
                let err = sigmoid(z) - target;
                for (g, x) in grad.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_bias += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad) {
                *w -= config.learning_rate * (g / n + config.l2 * *w);
            }
            bias -= config.learning_rate * grad_bias / n;

            if epoch % 100 == 0 {
                debug!(epoch, bias, "logistic regression progress");
            }
        }

        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::model("logistic regression diverged"));
        }

        Ok(LogisticRegression {
            weights,
            bias,
            means,
            scales,
        })
    }
}

fn check_training_data(features: &[FeatureVector], labels: &[bool]) -> Result<usize> {
    if features.is_empty() {
        return Err(Error::model("no training rows"));
    }
    if features.len() != labels.len() {
        return Err(Error::model(format!(
            "{} feature rows but {} labels",
            features.len(),
            labels.len()
        )));
    }

    let width = features[0].len();
    if let Some((i, row)) = features.iter().enumerate().find(|(_, f)| f.len() != width) {
        return Err(Error::schema_mismatch(format!(
            "row {i} has {} columns, expected {width}",
            row.len()
        )));
    }
    if features.iter().any(|f| f.as_slice().iter().any(|v| !v.is_finite())) {
        return Err(Error::model("training rows contain non-finite values"));
    }

    let positives = labels.iter().filter(|&&y| y).count();
    if positives == 0 || positives == labels.len() {
        return Err(Error::model("training labels contain a single class"));
    }

    Ok(width)
}

fn standardisation(features: &[FeatureVector], width: usize) -> (Vec<f64>, Vec<f64>) {
    let n = features.len() as f64;
    let mut means = vec![0.0; width];
    for f in features {
        for (m, v) in means.iter_mut().zip(f.as_slice()) {
            *m += v / n;
        }
    }

    let mut scales = vec![0.0; width];
    for f in features {
        for ((s, v), m) in scales.iter_mut().zip(f.as_slice()).zip(&means) {
            *s += (v - m).powi(2) / n;
        }
    }
    for s in &mut scales {
        *s = if *s > 1e-12 { s.sqrt() } else { 1.0 };
    }

    (means, scales)
}

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
