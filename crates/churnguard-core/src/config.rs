//! Schema configuration loaded from YAML

use crate::error::{Error, Result};
use crate::schema::{Bounds, FieldKind, FieldSpec, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Schema source: a version label plus ordered field definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema version label, recorded in every manifest
    pub version: String,

    /// Field definitions, in canonical order
    pub fields: Vec<FieldConfig>,
}

/// One field definition as written in config files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,

    pub kind: FieldKind,

    /// Allowed values (categorical kinds only)
    #[serde(default)]
    pub values: Vec<String>,

    /// Lower bound (numeric only)
    pub min: Option<f64>,

    /// Upper bound (numeric only)
    pub max: Option<f64>,
}

impl SchemaConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Describe an existing registry in config form
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        Self {
            version: registry.version().to_string(),
            fields: registry
                .all_fields()
                .iter()
                .map(|spec| FieldConfig {
                    name: spec.name.clone(),
                    kind: spec.kind,
                    values: spec.allowed_values.clone(),
                    min: spec.bounds.map(|b| b.min),
                    max: spec.bounds.map(|b| b.max),
                })
                .collect(),
        }
    }

    /// Build the immutable registry, checking every field definition
    pub fn into_registry(self) -> Result<SchemaRegistry> {
        let fields = self
            .fields
            .into_iter()
            .map(FieldConfig::into_spec)
            .collect::<Result<Vec<_>>>()?;
        SchemaRegistry::new(self.version, fields)
    }
}

impl FieldConfig {
    fn into_spec(self) -> Result<FieldSpec> {
        let distinct: BTreeSet<String> = self.values.iter().cloned().collect();
        if distinct.len() != self.values.len() {
            return Err(Error::config(format!(
                "field '{}' lists duplicate values",
                self.name
            )));
        }

        let bounds = match (self.kind, self.min, self.max) {
            (FieldKind::Numeric, Some(min), Some(max)) => Some(Bounds::new(min, max)?),
            (FieldKind::Numeric, _, _) => {
                return Err(Error::config(format!(
                    "numeric field '{}' needs both min and max",
                    self.name
                )))
            }
            (_, None, None) => None,
            _ => {
                return Err(Error::config(format!(
                    "categorical field '{}' cannot declare bounds",
                    self.name
                )))
            }
        };

        let spec = FieldSpec {
            name: self.name,
            kind: self.kind,
            allowed_values: distinct.into_iter().collect(),
            bounds,
        };
        spec.check()?;
        Ok(spec)
    }
}
