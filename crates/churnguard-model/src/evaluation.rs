//! Holdout evaluation metrics and deterministic train/holdout splits

use churnguard_core::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Confusion matrix counts at the decision threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

/// Metrics stored alongside every trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,

    /// Area under the ROC curve; `None` when the holdout has a single class
    pub roc_auc: Option<f64>,

    pub confusion: ConfusionMatrix,

    /// Number of rows evaluated
    pub support: usize,

    /// Probability threshold used for the confusion matrix
    pub threshold: f64,
}

impl EvaluationMetrics {
    /// Score predicted churn probabilities against true labels
    pub fn compute(probabilities: &[f64], labels: &[bool], threshold: f64) -> Result<Self> {
        if probabilities.len() != labels.len() {
            return Err(Error::model(format!(
                "{} predictions but {} labels",
                probabilities.len(),
                labels.len()
            )));
        }
        if probabilities.is_empty() {
            return Err(Error::model("cannot evaluate on an empty set"));
        }

        let mut confusion = ConfusionMatrix::default();
        for (&p, &y) in probabilities.iter().zip(labels) {
            match (p >= threshold, y) {
                (true, true) => confusion.true_positives += 1,
                (true, false) => confusion.false_positives += 1,
                (false, false) => confusion.true_negatives += 1,
                (false, true) => confusion.false_negatives += 1,
            }
        }

        let ConfusionMatrix {
            true_positives: tp,
            false_positives: fp,
            true_negatives: tn,
            false_negatives: fn_,
        } = confusion;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy: ratio(tp + tn, labels.len()),
            precision,
            recall,
            f1,
            roc_auc: roc_auc(probabilities, labels),
            confusion,
            support: labels.len(),
            threshold,
        })
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// ROC-AUC via the rank-sum statistic, averaging ranks of tied scores
fn roc_auc(probabilities: &[f64], labels: &[bool]) -> Option<f64> {
    let positives = labels.iter().filter(|&&y| y).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probabilities[order[j + 1]] == probabilities[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block [i, j] shares the average rank.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] {
                rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Row indices for training and holdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

impl HoldoutSplit {
    /// Shuffle `0..n` with a seeded RNG and cut off `fraction` as holdout.
    ///
    /// The training side always keeps at least one row. A fraction of zero
    /// yields an empty holdout.
    pub fn new(n: usize, fraction: f64, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(Error::config(format!(
                "holdout fraction must be in [0, 1), got {fraction}"
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let holdout_len = ((n as f64) * fraction).round() as usize;
        let holdout_len = holdout_len.min(n.saturating_sub(1));
        let train = indices.split_off(holdout_len);

        Ok(Self {
            train,
            holdout: indices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_on_known_predictions() {
        let probs = [0.9, 0.8, 0.3, 0.6, 0.1, 0.2];
        let labels = [true, true, true, false, false, false];
        let m = EvaluationMetrics::compute(&probs, &labels, 0.5).unwrap();

        assert_eq!(m.confusion.true_positives, 2);
        assert_eq!(m.confusion.false_negatives, 1);
        assert_eq!(m.confusion.false_positives, 1);
        assert_eq!(m.confusion.true_negatives, 2);
        assert!((m.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        // 8 of 9 positive/negative pairs are ordered correctly.
        assert!((m.roc_auc.unwrap() - 8.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_with_ties_and_single_class() {
        let m = EvaluationMetrics::compute(&[0.5, 0.5], &[true, false], 0.5).unwrap();
        assert_eq!(m.roc_auc, Some(0.5));

        let m = EvaluationMetrics::compute(&[0.7, 0.2], &[true, true], 0.5).unwrap();
        assert_eq!(m.roc_auc, None);
        assert_eq!(m.precision, 1.0);
    }

    #[test]
    fn test_empty_or_mismatched_inputs() {
        assert!(EvaluationMetrics::compute(&[], &[], 0.5).is_err());
        assert!(EvaluationMetrics::compute(&[0.1], &[], 0.5).is_err());
    }

    #[test]
    fn test_split_is_seeded_and_partitions() {
        let a = HoldoutSplit::new(100, 0.2, 7).unwrap();
        let b = HoldoutSplit::new(100, 0.2, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.holdout.len(), 20);
        assert_eq!(a.train.len(), 80);

        let mut all: Vec<usize> = a.train.iter().chain(&a.holdout).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());

        let c = HoldoutSplit::new(100, 0.2, 8).unwrap();
        assert_ne!(a.holdout, c.holdout);
    }

    #[test]
    fn test_split_edges() {
        assert!(HoldoutSplit::new(10, 1.0, 0).is_err());
        assert!(HoldoutSplit::new(10, -0.1, 0).is_err());
        assert!(HoldoutSplit::new(10, 0.0, 0).unwrap().holdout.is_empty());
        assert_eq!(HoldoutSplit::new(1, 0.9, 0).unwrap().train.len(), 1);
    }
}
