//! ChurnGuard Core
//!
//! Types shared by every ChurnGuard component.
//!
//! This crate provides:
//! - Raw customer records, labeled records and feature vectors
//! - The immutable, versioned schema registry and its YAML config form
//! - The validation gate that runs before any transformation
//! - Error types and result handling

pub mod config;
pub mod error;
pub mod fixtures;
pub mod schema;
pub mod types;
pub mod validation;

pub use config::{FieldConfig, SchemaConfig};
pub use error::{Error, Result};
pub use schema::{Bounds, FieldKind, FieldSpec, SchemaRegistry, TELCO_SCHEMA_VERSION};
pub use types::{FeatureVector, FieldValue, LabeledRecord, RawRecord, TrainingStage};
pub use validation::{
    BatchProfile, BatchValidation, ProfileWarning, ValidatedBatch, ValidationMode,
    ValidationReport, Validator, Violation, ViolationKind,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::schema::{FieldKind, FieldSpec, SchemaRegistry};
    pub use crate::types::{FeatureVector, FieldValue, LabeledRecord, RawRecord};
    pub use crate::validation::{ValidatedBatch, ValidationMode, ValidationReport, Validator};
}
