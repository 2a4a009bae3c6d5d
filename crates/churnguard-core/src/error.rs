//! Error types for ChurnGuard

use crate::types::TrainingStage;
use crate::validation::ValidationReport;

/// Result type alias using ChurnGuard's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ChurnGuard operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Lookup of a field the schema registry does not know
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Record rejected by the validation gate
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    /// Manifest/record or manifest/model pairing inconsistency
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A training pipeline stage failed; nothing was published
    #[error("training failed at stage {stage}: {source}")]
    TrainingStage {
        stage: TrainingStage,
        #[source]
        source: Box<Error>,
    },

    /// Classifier fitting or scoring errors
    #[error("model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors from artifact stores and loaders
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new schema mismatch error
    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    /// Create a new model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an error as the failure of a training stage
    pub fn at_stage(stage: TrainingStage, source: Error) -> Self {
        Self::TrainingStage {
            stage,
            source: Box::new(source),
        }
    }

    /// Whether the caller can recover by correcting its input.
    ///
    /// Only validation failures qualify. Pairing mismatches and stage
    /// failures point at a deployment or artifact-management bug.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// The validation report carried by this error, if any
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            Self::TrainingStage { source, .. } => source.validation_report(),
            _ => None,
        }
    }
}
