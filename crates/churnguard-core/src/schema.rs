//! Schema registry: the single definition of every input field
//!
//! The registry is an immutable value. Validators and encoders receive it
//! explicitly, so several schema versions can coexist in one process.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Kind of an input field, which decides how it is validated and encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Two-valued categorical, encoded as one 0/1 column
    Binary,

    /// N-valued categorical, one-hot encoded
    MultiCategory,

    /// Numeric passthrough
    Numeric,
}

impl FieldKind {
    /// Whether values of this kind are text categories
    pub fn is_categorical(self) -> bool {
        matches!(self, Self::Binary | Self::MultiCategory)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Binary => "binary",
            Self::MultiCategory => "multi_category",
            Self::Numeric => "numeric",
        })
    }
}

/// Inclusive numeric range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    /// Create bounds; `min` must not exceed `max`
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(Error::config(format!("invalid bounds [{min}, {max}]")));
        }
        Ok(Self { min, max })
    }

    /// Whether `value` lies within the range
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Clamp `value` into the range
    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Description of one input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name as it appears in raw records
    pub name: String,

    /// Field kind
    pub kind: FieldKind,

    /// Allowed categorical values, sorted and de-duplicated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,

    /// Numeric bounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl FieldSpec {
    /// Two-valued categorical field
    pub fn binary(name: impl Into<String>, values: [&str; 2]) -> Result<Self> {
        Self::categorical(name, FieldKind::Binary, values.iter().copied())
    }

    /// Multi-valued categorical field
    pub fn multi_category<'a>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        Self::categorical(name, FieldKind::MultiCategory, values)
    }

    /// Numeric field with inclusive bounds
    pub fn numeric(name: impl Into<String>, min: f64, max: f64) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            kind: FieldKind::Numeric,
            allowed_values: Vec::new(),
            bounds: Some(Bounds::new(min, max)?),
        };
        spec.check()?;
        Ok(spec)
    }

    fn categorical<'a>(
        name: impl Into<String>,
        kind: FieldKind,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let allowed: BTreeSet<String> = values.into_iter().map(str::to_string).collect();
        let spec = Self {
            name: name.into(),
            kind,
            allowed_values: allowed.into_iter().collect(),
            bounds: None,
        };
        spec.check()?;
        Ok(spec)
    }

    /// Check internal consistency of the spec
    pub fn check(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("field name must not be empty"));
        }

        let sorted = self.allowed_values.windows(2).all(|w| w[0] < w[1]);
        if !sorted {
            return Err(Error::config(format!(
                "allowed values of '{}' must be sorted and unique",
                self.name
            )));
        }

        match self.kind {
            FieldKind::Binary if self.allowed_values.len() != 2 => Err(Error::config(format!(
                "binary field '{}' needs exactly two allowed values, got {}",
                self.name,
                self.allowed_values.len()
            ))),
            FieldKind::MultiCategory if self.allowed_values.is_empty() => Err(Error::config(
                format!("categorical field '{}' has no allowed values", self.name),
            )),
            FieldKind::Numeric if self.bounds.is_none() => Err(Error::config(format!(
                "numeric field '{}' has no bounds",
                self.name
            ))),
            FieldKind::Numeric if !self.allowed_values.is_empty() => Err(Error::config(format!(
                "numeric field '{}' cannot list allowed values",
                self.name
            ))),
            _ => Ok(()),
        }
    }

    /// Whether `value` is one of the allowed categories
    pub fn allows(&self, value: &str) -> bool {
        self.allowed_values
            .binary_search_by(|v| v.as_str().cmp(value))
            .is_ok()
    }

    /// Copy of this spec with allowed values restricted to `observed`.
    ///
    /// Binary fields keep both values so their 0/1 mapping never depends
    /// on the training batch.
    pub fn narrowed_to(&self, observed: &BTreeSet<String>) -> Self {
        let mut spec = self.clone();
        if self.kind == FieldKind::MultiCategory {
            spec.allowed_values.retain(|v| observed.contains(v));
        }
        spec
    }
}

/// Immutable, versioned set of field specs in canonical order
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaRegistry {
    version: String,
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Build a registry from an ordered list of field specs
    pub fn new(version: impl Into<String>, fields: Vec<FieldSpec>) -> Result<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        for (position, spec) in fields.iter().enumerate() {
            spec.check()?;
            if index.insert(spec.name.clone(), position).is_some() {
                return Err(Error::config(format!("duplicate field '{}'", spec.name)));
            }
        }

        if fields.is_empty() {
            return Err(Error::config("schema must declare at least one field"));
        }

        Ok(Self {
            version: version.into(),
            fields,
            index,
        })
    }

    /// Schema version label
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Look up a field spec by name
    pub fn describe(&self, field_name: &str) -> Result<&FieldSpec> {
        self.index
            .get(field_name)
            .map(|&i| &self.fields[i])
            .ok_or_else(|| Error::UnknownField(field_name.to_string()))
    }

    /// All field specs in canonical order
    pub fn all_fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the registry is empty (never true for a constructed registry)
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The built-in telecom customer schema (18 attributes)
    pub fn telco() -> Result<Self> {
        Self::new(TELCO_SCHEMA_VERSION, telco_fields()?)
    }
}

/// Version label of the built-in telecom schema
pub const TELCO_SCHEMA_VERSION: &str = "telco-v1";

const YES_NO: [&str; 2] = ["No", "Yes"];
const INTERNET_ADDON: [&str; 3] = ["No", "No internet service", "Yes"];

fn telco_fields() -> Result<Vec<FieldSpec>> {
    Ok(vec![
        FieldSpec::binary("gender", ["Female", "Male"])?,
        FieldSpec::numeric("SeniorCitizen", 0.0, 1.0)?,
        FieldSpec::binary("Partner", YES_NO)?,
        FieldSpec::binary("Dependents", YES_NO)?,
        FieldSpec::numeric("tenure", 0.0, 120.0)?,
        FieldSpec::binary("PhoneService", YES_NO)?,
        FieldSpec::multi_category("MultipleLines", ["No", "No phone service", "Yes"])?,
        FieldSpec::multi_category("InternetService", ["DSL", "Fiber optic", "No"])?,
        FieldSpec::multi_category("OnlineSecurity", INTERNET_ADDON)?,
        FieldSpec::multi_category("OnlineBackup", INTERNET_ADDON)?,
        FieldSpec::multi_category("DeviceProtection", INTERNET_ADDON)?,
        FieldSpec::multi_category("TechSupport", INTERNET_ADDON)?,
        FieldSpec::multi_category("StreamingTV", INTERNET_ADDON)?,
        FieldSpec::multi_category("StreamingMovies", INTERNET_ADDON)?,
        FieldSpec::multi_category("Contract", ["Month-to-month", "One year", "Two year"])?,
        FieldSpec::binary("PaperlessBilling", YES_NO)?,
        FieldSpec::multi_category(
            "PaymentMethod",
            [
                "Bank transfer (automatic)",
                "Credit card (automatic)",
                "Electronic check",
                "Mailed check",
            ],
        )?,
        FieldSpec::numeric("MonthlyCharges", 0.0, 500.0)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telco_schema_shape() {
        let registry = SchemaRegistry::telco().unwrap();
        assert_eq!(registry.len(), 18);
        assert_eq!(registry.version(), TELCO_SCHEMA_VERSION);

        let contract = registry.describe("Contract").unwrap();
        assert_eq!(contract.kind, FieldKind::MultiCategory);
        assert_eq!(
            contract.allowed_values,
            vec!["Month-to-month", "One year", "Two year"]
        );

        let tenure = registry.describe("tenure").unwrap();
        assert_eq!(tenure.kind, FieldKind::Numeric);
        assert!(tenure.bounds.unwrap().contains(72.0));
    }

    #[test]
    fn test_unknown_field_lookup() {
        let registry = SchemaRegistry::telco().unwrap();
        let err = registry.describe("customerID").unwrap_err();
        assert!(matches!(err, Error::UnknownField(name) if name == "customerID"));
    }

    #[test]
    fn test_allowed_values_sorted_regardless_of_input_order() {
        let spec = FieldSpec::binary("Partner", ["Yes", "No"]).unwrap();
        assert_eq!(spec.allowed_values, vec!["No", "Yes"]);
        assert!(spec.allows("Yes"));
        assert!(!spec.allows("yes"));
    }

    #[test]
    fn test_invalid_specs_rejected() {
        assert!(FieldSpec::binary("x", ["Yes", "Yes"]).is_err());
        assert!(FieldSpec::multi_category("x", std::iter::empty()).is_err());
        assert!(FieldSpec::numeric("x", 5.0, 1.0).is_err());
        assert!(FieldSpec::numeric("x", f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let fields = vec![
            FieldSpec::numeric("tenure", 0.0, 10.0).unwrap(),
            FieldSpec::numeric("tenure", 0.0, 20.0).unwrap(),
        ];
        assert!(matches!(
            SchemaRegistry::new("v", fields),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_narrowing_keeps_binary_values() {
        let observed: BTreeSet<String> = ["Yes".to_string()].into_iter().collect();

        let partner = FieldSpec::binary("Partner", YES_NO).unwrap();
        assert_eq!(partner.narrowed_to(&observed).allowed_values, vec!["No", "Yes"]);

        let internet = FieldSpec::multi_category("InternetService", ["DSL", "Fiber optic", "No"])
            .unwrap();
        let dsl_no: BTreeSet<String> = ["DSL", "No"].iter().map(|s| s.to_string()).collect();
        assert_eq!(internet.narrowed_to(&dsl_no).allowed_values, vec!["DSL", "No"]);
    }
}
