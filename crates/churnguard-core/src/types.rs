//! Core types for ChurnGuard

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single raw attribute value as supplied by a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric attribute (tenure, charges, 0/1 flags)
    Number(f64),

    /// Categorical attribute ("Yes", "Fiber optic", ...)
    Text(String),
}

impl FieldValue {
    /// Text payload, if this is a categorical value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// Numeric payload, if this is a numeric value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Short name of the value shape, used in violation messages
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

/// One customer's raw attributes, keyed by field name.
///
/// Keys are kept sorted so serialisation is stable, but nothing downstream
/// relies on key order: column order comes from the feature manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// Look up a field value
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields present
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A raw record with its known churn outcome, used for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    /// Customer attributes
    pub record: RawRecord,

    /// Whether the customer churned
    pub churned: bool,
}

impl LabeledRecord {
    /// Create a labeled record
    pub fn new(record: RawRecord, churned: bool) -> Self {
        Self { record, churned }
    }
}

/// Fixed-length numeric encoding of one record, one value per manifest column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Wrap encoded values
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Encoded values in manifest column order
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume into the underlying values
    pub fn into_inner(self) -> Vec<f64> {
        self.values
    }
}

/// Stages of a training run, in the only order they may be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    Loaded,
    Validated,
    ManifestFit,
    Encoded,
    ModelFit,
    Evaluated,
}

impl TrainingStage {
    /// All stages in execution order
    pub const ALL: [TrainingStage; 6] = [
        Self::Loaded,
        Self::Validated,
        Self::ManifestFit,
        Self::Encoded,
        Self::ModelFit,
        Self::Evaluated,
    ];

    /// The stage that must follow this one
    pub fn next(self) -> Option<TrainingStage> {
        match self {
            Self::Loaded => Some(Self::Validated),
            Self::Validated => Some(Self::ManifestFit),
            Self::ManifestFit => Some(Self::Encoded),
            Self::Encoded => Some(Self::ModelFit),
            Self::ModelFit => Some(Self::Evaluated),
            Self::Evaluated => None,
        }
    }

    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Validated => "validated",
            Self::ManifestFit => "manifest_fit",
            Self::Encoded => "encoded",
            Self::ModelFit => "model_fit",
            Self::Evaluated => "evaluated",
        }
    }
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
