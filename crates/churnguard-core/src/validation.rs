//! Validation gate run before any transformation
//!
//! Every field of the registry is checked and every violation is reported,
//! not just the first. Validation never mutates or repairs a record.

use crate::error::{Error, Result};
use crate::schema::{Bounds, FieldKind, FieldSpec, SchemaRegistry};
use crate::types::{FieldValue, LabeledRecord, RawRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Context a record is validated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Part of a labeled training batch; observed values are profiled
    TrainingBatch,

    /// A single live record; any violation rejects it
    ServingSingle,
}

/// What is wrong with a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Required field absent from the record
    Missing,

    /// Categorical value outside the allowed set
    UnknownCategory { value: String },

    /// Numeric value outside bounds (or not finite)
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Value shape does not match the field kind
    InvalidType { expected: FieldKind, found: String },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::UnknownCategory { value } => write!(f, "unknown category {value:?}"),
            Self::OutOfRange { value, min, max } => {
                write!(f, "{value} outside [{min}, {max}]")
            }
            Self::InvalidType { expected, found } => {
                write!(f, "expected {expected} value, found {found}")
            }
        }
    }
}

/// One field-level violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Position of the record within its batch, when validated as part of one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<usize>,

    /// Field name
    pub field: String,

    /// Violation detail
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl Violation {
    /// Create a violation for a standalone record
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            record: None,
            field: field.into(),
            kind,
        }
    }

    fn at_record(mut self, index: usize) -> Self {
        self.record = Some(index);
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record {
            Some(index) => write!(f, "record {index}: {}: {}", self.field, self.kind),
            None => write!(f, "{}: {}", self.field, self.kind),
        }
    }
}

/// Outcome of validating a record (or a batch): pass, or the full list of violations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    /// Build a report from violations
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Whether the record was accepted
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// All violations, in registry field order
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Names of the violated fields, de-duplicated
    pub fn violated_fields(&self) -> BTreeSet<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    /// `Ok(())` when valid, otherwise a `Validation` error carrying this report
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.violations.is_empty() {
            return write!(f, "no violations");
        }
        write!(f, "{} violation(s): ", self.violations.len())?;
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// Non-fatal findings from profiling a training batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileWarning {
    /// Categorical field where only one value was observed
    DegenerateCategory { field: String, value: String },

    /// Numeric field with a single observed value
    ConstantNumeric { field: String, value: f64 },
}

impl fmt::Display for ProfileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateCategory { field, value } => {
                write!(f, "field '{field}' only ever takes value {value:?}")
            }
            Self::ConstantNumeric { field, value } => {
                write!(f, "field '{field}' is constant at {value}")
            }
        }
    }
}

/// Observed values of a training batch, used to fit the feature manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchProfile {
    observed: BTreeMap<String, BTreeSet<String>>,
    numeric_ranges: BTreeMap<String, Bounds>,
    warnings: Vec<ProfileWarning>,
}

impl BatchProfile {
    /// Distinct categories observed for a categorical field
    pub fn observed_categories(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.observed.get(field)
    }

    /// Observed `[min, max]` of a numeric field
    pub fn numeric_range(&self, field: &str) -> Option<Bounds> {
        self.numeric_ranges.get(field).copied()
    }

    /// Degenerate-field warnings
    pub fn warnings(&self) -> &[ProfileWarning] {
        &self.warnings
    }

    fn observe(&mut self, spec: &FieldSpec, value: &FieldValue) {
        match (spec.kind, value) {
            (FieldKind::Numeric, FieldValue::Number(n)) => {
                self.numeric_ranges
                    .entry(spec.name.clone())
                    .and_modify(|b| {
                        b.min = b.min.min(*n);
                        b.max = b.max.max(*n);
                    })
                    .or_insert(Bounds { min: *n, max: *n });
            }
            (_, FieldValue::Text(s)) => {
                self.observed
                    .entry(spec.name.clone())
                    .or_default()
                    .insert(s.clone());
            }
            _ => {}
        }
    }

    fn collect_warnings(&mut self, registry: &SchemaRegistry) {
        self.warnings.clear();
        for spec in registry.all_fields() {
            if spec.kind.is_categorical() {
                if let Some(values) = self.observed.get(&spec.name) {
                    if values.len() == 1 {
                        let value = values.iter().next().cloned().unwrap_or_default();
                        self.warnings.push(ProfileWarning::DegenerateCategory {
                            field: spec.name.clone(),
                            value,
                        });
                    }
                }
            } else if let Some(range) = self.numeric_ranges.get(&spec.name) {
                if range.min == range.max {
                    self.warnings.push(ProfileWarning::ConstantNumeric {
                        field: spec.name.clone(),
                        value: range.min,
                    });
                }
            }
        }
    }
}

/// Result of validating a whole training batch
#[derive(Debug, Clone)]
pub struct BatchValidation {
    /// Violations across all records, tagged with record position
    pub report: ValidationReport,

    /// Number of records that failed
    pub rejected: usize,

    /// Number of records inspected
    pub total: usize,

    /// Observed values, computed over accepted records
    pub profile: BatchProfile,
}

/// Checks raw records against a schema registry
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<SchemaRegistry>,
}

impl Validator {
    /// Create a validator bound to a registry
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this validator checks against
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Validate one record, reporting every violated field
    pub fn validate(&self, record: &RawRecord, mode: ValidationMode) -> ValidationReport {
        let violations: Vec<Violation> = self
            .registry
            .all_fields()
            .iter()
            .filter_map(|spec| {
                check_field(spec, record.get(&spec.name)).map(|kind| Violation::new(&spec.name, kind))
            })
            .collect();

        if !violations.is_empty() && mode == ValidationMode::ServingSingle {
            warn!(
                schema = self.registry.version(),
                violations = violations.len(),
                "rejected serving record"
            );
        }

        ValidationReport::from_violations(violations)
    }

    /// Strict serving check: `Err(Error::Validation)` on any violation
    pub fn check_serving(&self, record: &RawRecord) -> Result<()> {
        self.validate(record, ValidationMode::ServingSingle)
            .into_result()
    }

    /// Validate a batch and profile the observed values of accepted records
    pub fn validate_batch<'a>(
        &self,
        records: impl IntoIterator<Item = &'a RawRecord>,
    ) -> BatchValidation {
        let mut violations = Vec::new();
        let mut profile = BatchProfile::default();
        let mut rejected = 0;
        let mut total = 0;

        for (index, record) in records.into_iter().enumerate() {
            total += 1;
            let report = self.validate(record, ValidationMode::TrainingBatch);
            if report.is_valid() {
                for spec in self.registry.all_fields() {
                    if let Some(value) = record.get(&spec.name) {
                        profile.observe(spec, value);
                    }
                }
            } else {
                rejected += 1;
                debug!(record = index, "training record failed validation");
                violations.extend(report.violations.into_iter().map(|v| v.at_record(index)));
            }
        }

        profile.collect_warnings(&self.registry);
        for warning in profile.warnings() {
            warn!(schema = self.registry.version(), "{warning}");
        }

        BatchValidation {
            report: ValidationReport::from_violations(violations),
            rejected,
            total,
            profile,
        }
    }
}

fn check_field(spec: &FieldSpec, value: Option<&FieldValue>) -> Option<ViolationKind> {
    let value = match value {
        Some(value) => value,
        None => return Some(ViolationKind::Missing),
    };

    match (spec.kind, value) {
        (FieldKind::Numeric, FieldValue::Number(n)) => {
            let bounds = spec.bounds?;
            (!bounds.contains(*n)).then_some(ViolationKind::OutOfRange {
                value: *n,
                min: bounds.min,
                max: bounds.max,
            })
        }
        (FieldKind::Binary | FieldKind::MultiCategory, FieldValue::Text(s)) => {
            (!spec.allows(s)).then(|| ViolationKind::UnknownCategory { value: s.clone() })
        }
        (expected, found) => Some(ViolationKind::InvalidType {
            expected,
            found: found.shape().to_string(),
        }),
    }
}

/// A labeled training batch in which every record passed validation.
///
/// This is the only input `Encoder::fit` accepts, so a manifest can never be
/// fit from unvalidated data.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    registry: Arc<SchemaRegistry>,
    records: Vec<LabeledRecord>,
    profile: BatchProfile,
}

impl ValidatedBatch {
    /// Validate `records` as a whole; any violation rejects the entire batch
    pub fn new(validator: &Validator, records: Vec<LabeledRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::config("training batch is empty"));
        }

        let outcome = validator.validate_batch(records.iter().map(|r| &r.record));
        if outcome.rejected > 0 {
            warn!(
                rejected = outcome.rejected,
                total = outcome.total,
                "training batch failed validation"
            );
            return Err(Error::Validation(outcome.report));
        }

        Ok(Self {
            registry: Arc::clone(validator.registry()),
            records,
            profile: outcome.profile,
        })
    }

    /// Registry the batch was validated against
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validated records with their labels
    pub fn records(&self) -> &[LabeledRecord] {
        &self.records
    }

    /// Observed-value profile
    pub fn profile(&self) -> &BatchProfile {
        &self.profile
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch is empty (never true once constructed)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_record;

    fn validator() -> Validator {
        Validator::new(Arc::new(SchemaRegistry::telco().unwrap()))
    }

    #[test]
    fn test_valid_record_passes() {
        let report = validator().validate(&sample_record(), ValidationMode::ServingSingle);
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn test_reports_every_violated_field() {
        let mut record = sample_record();
        record.remove("tenure");
        record.insert("Contract", "Three year");
        record.insert("MonthlyCharges", -4.0);
        record.insert("Partner", 1.0);

        let report = validator().validate(&record, ValidationMode::ServingSingle);
        assert!(!report.is_valid());

        let fields = report.violated_fields();
        assert_eq!(
            fields.into_iter().collect::<Vec<_>>(),
            vec!["Contract", "MonthlyCharges", "Partner", "tenure"]
        );

        let kinds: Vec<_> = report.violations().iter().map(|v| &v.kind).collect();
        assert!(kinds.contains(&&ViolationKind::Missing));
        assert!(kinds.contains(&&ViolationKind::UnknownCategory {
            value: "Three year".into()
        }));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, ViolationKind::OutOfRange { value, .. } if *value == -4.0)));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, ViolationKind::InvalidType { expected: FieldKind::Binary, .. })));
    }

    #[test]
    fn test_no_coercion_of_numeric_strings() {
        let record = sample_record().with("tenure", "12");
        let report = validator().validate(&record, ValidationMode::ServingSingle);
        assert_eq!(report.violations().len(), 1);
        assert!(matches!(
            report.violations()[0].kind,
            ViolationKind::InvalidType { expected: FieldKind::Numeric, .. }
        ));
    }

    #[test]
    fn test_non_finite_numeric_is_out_of_range() {
        let record = sample_record().with("MonthlyCharges", f64::NAN);
        let report = validator().validate(&record, ValidationMode::TrainingBatch);
        assert!(matches!(
            report.violations()[0].kind,
            ViolationKind::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_validation_does_not_mutate_record() {
        let record = sample_record().with("Contract", "bogus");
        let before = record.clone();
        let _ = validator().validate(&record, ValidationMode::ServingSingle);
        assert_eq!(record, before);
    }

    #[test]
    fn test_check_serving_error_is_client_error() {
        let record = sample_record().with("InternetService", "Satellite");
        let err = validator().check_serving(&record).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_batch_profile_and_degenerate_warning() {
        let a = sample_record().with("Contract", "One year");
        let b = sample_record().with("Contract", "Two year");
        let outcome = validator().validate_batch([&a, &b]);

        assert_eq!(outcome.rejected, 0);
        assert_eq!(outcome.total, 2);
        let contracts = outcome.profile.observed_categories("Contract").unwrap();
        assert_eq!(contracts.len(), 2);

        // Every other categorical field is identical across both records.
        assert!(outcome.profile.warnings().iter().any(|w| matches!(
            w,
            ProfileWarning::DegenerateCategory { field, .. } if field == "gender"
        )));
        assert!(!outcome.profile.warnings().iter().any(|w| matches!(
            w,
            ProfileWarning::DegenerateCategory { field, .. } if field == "Contract"
        )));
    }

    #[test]
    fn test_batch_violations_tagged_with_record_index() {
        let good = sample_record();
        let bad = sample_record().with("gender", "Other");
        let outcome = validator().validate_batch([&good, &bad, &good]);

        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.report.violations()[0].record, Some(1));
        assert!(outcome.report.to_string().contains("record 1: gender"));
    }

    #[test]
    fn test_validated_batch_rejects_whole_batch() {
        let v = validator();
        let records = vec![
            LabeledRecord::new(sample_record(), true),
            LabeledRecord::new(sample_record().with("tenure", 500.0), false),
        ];
        let err = ValidatedBatch::new(&v, records).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(ValidatedBatch::new(&v, Vec::new()).is_err());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn every_removed_field_is_reported(mask in proptest::collection::vec(any::<bool>(), 18)) {
                let v = validator();
                let mut record = sample_record();
                let mut removed = BTreeSet::new();
                for (spec, drop) in v.registry().all_fields().iter().zip(&mask) {
                    if *drop {
                        record.remove(&spec.name);
                        removed.insert(spec.name.clone());
                    }
                }

                let report = v.validate(&record, ValidationMode::ServingSingle);
                let reported: BTreeSet<String> =
                    report.violated_fields().into_iter().map(str::to_string).collect();
                prop_assert_eq!(reported, removed.clone());
                prop_assert_eq!(report.is_valid(), removed.is_empty());
            }
        }
    }
}
