//! Serving metrics
//!
//! In-process counters for tests and the CLI summary, mirrored to the
//! `metrics` facade so any installed recorder sees the same numbers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter and histogram names published through the `metrics` facade
pub const PREDICTIONS_TOTAL: &str = "churnguard_predictions_total";
pub const REJECTIONS_TOTAL: &str = "churnguard_rejections_total";
pub const PREDICT_LATENCY_US: &str = "churnguard_predict_latency_us";

/// Register descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(PREDICTIONS_TOTAL, "Predictions returned, labelled by outcome");
    metrics::describe_counter!(
        REJECTIONS_TOTAL,
        "Serving requests rejected, labelled by reason"
    );
    metrics::describe_histogram!(
        PREDICT_LATENCY_US,
        metrics::Unit::Microseconds,
        "End-to-end single-record predict latency"
    );
}

/// Shared serving counters; clones observe the same values
#[derive(Clone, Default)]
pub struct ServingMetrics {
    inner: Arc<ServingMetricsInner>,
}

#[derive(Default)]
struct ServingMetricsInner {
    predictions: AtomicU64,
    churn_predictions: AtomicU64,
    validation_rejections: AtomicU64,
    schema_mismatches: AtomicU64,
    total_latency_us: AtomicU64,
}

impl ServingMetrics {
    /// Create a fresh set of counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, churn: bool, latency_us: u64) {
        self.inner.predictions.fetch_add(1, Ordering::Relaxed);
        if churn {
            self.inner.churn_predictions.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);

        let outcome = if churn { "churn" } else { "retain" };
        metrics::counter!(PREDICTIONS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(PREDICT_LATENCY_US).record(latency_us as f64);
    }

    /// Record a record rejected by serving validation
    pub fn record_validation_rejection(&self) {
        self.inner
            .validation_rejections
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!(REJECTIONS_TOTAL, "reason" => "validation").increment(1);
    }

    /// Record a manifest/record or manifest/model mismatch
    pub fn record_schema_mismatch(&self) {
        self.inner.schema_mismatches.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(REJECTIONS_TOTAL, "reason" => "schema_mismatch").increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> ServingSnapshot {
        ServingSnapshot {
            predictions: self.inner.predictions.load(Ordering::Relaxed),
            churn_predictions: self.inner.churn_predictions.load(Ordering::Relaxed),
            validation_rejections: self.inner.validation_rejections.load(Ordering::Relaxed),
            schema_mismatches: self.inner.schema_mismatches.load(Ordering::Relaxed),
            total_latency_us: self.inner.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ServingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ServingMetrics").field(&self.snapshot()).finish()
    }
}

/// Point-in-time copy of [`ServingMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServingSnapshot {
    pub predictions: u64,
    pub churn_predictions: u64,
    pub validation_rejections: u64,
    pub schema_mismatches: u64,
    pub total_latency_us: u64,
}

impl ServingSnapshot {
    /// Requests seen, successful or not
    pub fn requests(&self) -> u64 {
        self.predictions + self.validation_rejections + self.schema_mismatches
    }

    /// Share of requests rejected by validation or pairing checks
    pub fn rejection_rate(&self) -> f64 {
        let requests = self.requests();
        if requests == 0 {
            0.0
        } else {
            (self.validation_rejections + self.schema_mismatches) as f64 / requests as f64
        }
    }

    /// Average latency per successful prediction
    pub fn avg_latency_us(&self) -> u64 {
        if self.predictions == 0 {
            0
        } else {
            self.total_latency_us / self.predictions
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_rates() {
        describe_metrics();
        let metrics = ServingMetrics::new();
        metrics.record_prediction(true, 100);
        metrics.record_prediction(false, 300);
        metrics.record_validation_rejection();
        metrics.record_schema_mismatch();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.predictions, 2);
        assert_eq!(snapshot.churn_predictions, 1);
        assert_eq!(snapshot.requests(), 4);
        assert_eq!(snapshot.rejection_rate(), 0.5);
        assert_eq!(snapshot.avg_latency_us(), 200);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = ServingMetrics::new();
        let clone = metrics.clone();
        clone.record_validation_rejection();
        assert_eq!(metrics.snapshot().validation_rejections, 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = ServingMetrics::new().snapshot();
        assert_eq!(snapshot.rejection_rate(), 0.0);
        assert_eq!(snapshot.avg_latency_us(), 0);
    }
}
