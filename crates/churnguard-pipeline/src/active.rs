//! The active `(manifest, model)` pair and its atomic replacement
//!
//! Readers take an `Arc` to the current pair and keep using it for the
//! whole request, so a concurrent swap never hands them a manifest from one
//! training run and a model from another.

use crate::bundle::ArtifactBundle;
use crate::inference::{InferencePipeline, Prediction};
use crate::store::ArtifactStore;
use crate::telemetry::ServingMetrics;
use churnguard_core::{RawRecord, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// One published pair plus the generation it was installed as
#[derive(Debug)]
pub struct ActivePair {
    generation: u64,
    run_id: Option<String>,
    pipeline: InferencePipeline,
}

impl ActivePair {
    /// Monotonically increasing install counter, starting at 1
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Training run the pair came from, when installed from a bundle
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Pipeline serving this pair
    pub fn pipeline(&self) -> &InferencePipeline {
        &self.pipeline
    }
}

/// Holder of the currently served artifact pair
#[derive(Debug)]
pub struct ActiveArtifacts {
    current: RwLock<Arc<ActivePair>>,
    metrics: ServingMetrics,
}

impl ActiveArtifacts {
    /// Start serving `pipeline` as generation 1
    pub fn new(pipeline: InferencePipeline) -> Self {
        Self::start(pipeline, None)
    }

    /// Start serving a verified bundle
    pub fn from_bundle(bundle: ArtifactBundle) -> Result<Self> {
        let run_id = bundle.run_id.clone();
        let pipeline = InferencePipeline::from_bundle(bundle)?;
        Ok(Self::start(pipeline, Some(run_id)))
    }

    fn start(pipeline: InferencePipeline, run_id: Option<String>) -> Self {
        let metrics = pipeline.metrics().clone();
        Self {
            current: RwLock::new(Arc::new(ActivePair {
                generation: 1,
                run_id,
                pipeline,
            })),
            metrics,
        }
    }

    /// Start serving whatever `store` last saved
    pub fn load_from(store: &dyn ArtifactStore) -> Result<Self> {
        Self::from_bundle(store.load()?)
    }

    /// Pin the current pair for the duration of a request
    pub fn current(&self) -> Arc<ActivePair> {
        Arc::clone(&self.current.read())
    }

    /// Generation currently installed
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Counters shared by every generation
    pub fn metrics(&self) -> &ServingMetrics {
        &self.metrics
    }

    /// Verify a new bundle and install it in one step.
    ///
    /// On error the previous pair stays active. Returns the new generation.
    pub fn swap(&self, bundle: ArtifactBundle) -> Result<u64> {
        let run_id = bundle.run_id.clone();
        let pipeline = InferencePipeline::from_bundle(bundle)?;
        Ok(self.install(pipeline, Some(run_id)))
    }

    /// Install an already-built pipeline; returns the new generation
    pub fn swap_pipeline(&self, pipeline: InferencePipeline) -> u64 {
        self.install(pipeline, None)
    }

    /// Reload from `store` and install
    pub fn reload(&self, store: &dyn ArtifactStore) -> Result<u64> {
        self.swap(store.load()?)
    }

    /// Score a record against the pair current at call time
    pub fn predict(&self, record: &RawRecord) -> Result<Prediction> {
        self.current().pipeline.predict(record)
    }

    fn install(&self, pipeline: InferencePipeline, run_id: Option<String>) -> u64 {
        let pipeline = pipeline.with_metrics(self.metrics.clone());
        let fingerprint = pipeline.manifest().fingerprint().to_string();

        let mut guard = self.current.write();
        let generation = guard.generation + 1;
        *guard = Arc::new(ActivePair {
            generation,
            run_id,
            pipeline,
        });
        drop(guard);

        info!(generation, fingerprint = %fingerprint, "artifact pair swapped");
        generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::store::MemoryArtifactStore;
    use crate::training::TrainingPipeline;
    use churnguard_core::fixtures::{sample_batch, sample_record};
    use churnguard_core::{Error, SchemaRegistry};
    use churnguard_features::EncoderConfig;

    fn bundle(drop_first: bool) -> ArtifactBundle {
        let config = TrainingConfig {
            encoder: EncoderConfig {
                drop_first,
                clip_numeric: false,
            },
            ..TrainingConfig::default()
        };
        TrainingPipeline::new(Arc::new(SchemaRegistry::telco().unwrap()), config)
            .unwrap()
            .run(sample_batch(120))
            .unwrap()
    }

    #[test]
    fn test_swap_bumps_generation_and_keeps_pinned_reader() {
        let first = bundle(false);
        let first_fp = first.manifest.fingerprint().to_string();
        let active = ActiveArtifacts::from_bundle(first).unwrap();
        assert_eq!(active.generation(), 1);

        let pinned = active.current();
        let generation = active.swap(bundle(true)).unwrap();
        assert_eq!(generation, 2);

        assert_eq!(pinned.pipeline().manifest().fingerprint(), first_fp);
        assert_ne!(active.current().pipeline().manifest().fingerprint(), first_fp);
        pinned.pipeline().predict(&sample_record()).unwrap();
    }

    #[test]
    fn test_failed_swap_keeps_previous_pair() {
        let active = ActiveArtifacts::from_bundle(bundle(false)).unwrap();
        let mut broken = bundle(false);
        broken.model = bundle(true).model;

        let err = active.swap(broken).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert_eq!(active.generation(), 1);
        active.predict(&sample_record()).unwrap();
    }

    #[test]
    fn test_metrics_survive_swaps() {
        let store = MemoryArtifactStore::new();
        store.save(&bundle(false)).unwrap();
        let active = ActiveArtifacts::load_from(&store).unwrap();
        assert!(active.current().run_id().is_some());

        active.predict(&sample_record()).unwrap();
        active.reload(&store).unwrap();
        active.predict(&sample_record()).unwrap();
        assert_eq!(active.metrics().snapshot().predictions, 2);
    }
}
