//! ChurnGuard Pipeline
//!
//! Training and serving around the feature core:
//!
//! - [`TrainingPipeline`] walks a strict stage sequence and produces an
//!   [`ArtifactBundle`] holding a paired manifest, model and metrics
//! - [`InferencePipeline`] serves predictions from one frozen pair
//! - [`ActiveArtifacts`] swaps the served pair atomically after retraining
//! - [`ArtifactStore`] and [`DataLoader`] are the seams to external storage

pub mod active;
pub mod api;
pub mod bundle;
pub mod config;
pub mod inference;
pub mod loader;
pub mod store;
pub mod telemetry;
pub mod training;

pub use active::{ActiveArtifacts, ActivePair};
pub use api::{fit_manifest, predict, train, transform, validate};
pub use bundle::{ArtifactBundle, EvaluationSet, TrainingSummary, BUNDLE_FORMAT_VERSION};
pub use config::TrainingConfig;
pub use inference::{InferencePipeline, Prediction};
pub use loader::{DataLoader, InMemoryLoader};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, BUNDLE_FILE_NAME};
pub use telemetry::{describe_metrics, ServingMetrics, ServingSnapshot};
pub use training::TrainingPipeline;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::active::ActiveArtifacts;
    pub use crate::bundle::ArtifactBundle;
    pub use crate::inference::{InferencePipeline, Prediction};
    pub use crate::store::{ArtifactStore, FsArtifactStore};
    pub use crate::training::TrainingPipeline;
}
