//! Feature manifest: the frozen column layout shared by training and serving
//!
//! A manifest is only ever produced by [`Encoder::fit`](crate::Encoder::fit).
//! Its fingerprint is a SHA-256 over the canonical JSON of its body and is
//! re-checked whenever a manifest is deserialised, so an edited or truncated
//! manifest never loads.

use crate::encoder::EncoderConfig;
use churnguard_core::{Bounds, Error, FieldKind, FieldSpec, Result, SchemaRegistry};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// Current on-disk manifest format
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// How one output column is computed from its source field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnEncoding {
    /// Two-valued categorical: `zero` maps to 0.0, `one` to 1.0
    Binary { zero: String, one: String },

    /// One-hot indicator: 1.0 when the field equals `value`
    Indicator { value: String },

    /// Numeric passthrough, optionally clipped to fitted bounds
    Numeric {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clip: Option<Bounds>,
    },
}

/// One output column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name (`field` or `field=value`)
    pub name: String,

    /// Source field
    pub field: String,

    /// Value mapping
    pub encoding: ColumnEncoding,
}

impl ColumnDescriptor {
    pub(crate) fn binary(spec: &FieldSpec) -> Result<Self> {
        match spec.allowed_values.as_slice() {
            [zero, one] => Ok(Self {
                name: spec.name.clone(),
                field: spec.name.clone(),
                encoding: ColumnEncoding::Binary {
                    zero: zero.clone(),
                    one: one.clone(),
                },
            }),
            other => Err(Error::config(format!(
                "binary field '{}' has {} allowed values",
                spec.name,
                other.len()
            ))),
        }
    }

    pub(crate) fn indicator(field: &str, value: &str) -> Self {
        Self {
            name: format!("{field}={value}"),
            field: field.to_string(),
            encoding: ColumnEncoding::Indicator {
                value: value.to_string(),
            },
        }
    }

    pub(crate) fn numeric(field: &str, clip: Option<Bounds>) -> Self {
        Self {
            name: field.to_string(),
            field: field.to_string(),
            encoding: ColumnEncoding::Numeric { clip },
        }
    }
}

/// Fingerprinted part of the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ManifestBody {
    format_version: u32,
    schema_version: String,
    policy: EncoderConfig,

    /// Field specs as seen by the manifest: multi-category values narrowed
    /// to those observed at fit time
    fields: Vec<FieldSpec>,

    /// Observed numeric ranges of the training batch
    observed_ranges: BTreeMap<String, Bounds>,

    columns: Vec<ColumnDescriptor>,
}

/// Frozen, fingerprinted output column layout
///
/// Deserializing does not check the fingerprint; loaders call
/// [`FeatureManifest::verify`] before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ManifestRepr", into = "ManifestRepr")]
pub struct FeatureManifest {
    body: ManifestBody,
    fingerprint: String,
}

#[derive(Clone, Serialize, Deserialize)]
struct ManifestRepr {
    fingerprint: String,
    manifest: ManifestBody,
}

impl From<FeatureManifest> for ManifestRepr {
    fn from(m: FeatureManifest) -> Self {
        Self {
            fingerprint: m.fingerprint,
            manifest: m.body,
        }
    }
}

impl From<ManifestRepr> for FeatureManifest {
    fn from(repr: ManifestRepr) -> Self {
        Self {
            body: repr.manifest,
            fingerprint: repr.fingerprint,
        }
    }
}

impl FeatureManifest {
    pub(crate) fn seal(
        schema_version: &str,
        policy: EncoderConfig,
        fields: Vec<FieldSpec>,
        observed_ranges: BTreeMap<String, Bounds>,
        columns: Vec<ColumnDescriptor>,
    ) -> Result<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name.as_str())) {
            return Err(Error::config(format!("duplicate column name '{}'", dup.name)));
        }

        let body = ManifestBody {
            format_version: MANIFEST_FORMAT_VERSION,
            schema_version: schema_version.to_string(),
            policy,
            fields,
            observed_ranges,
            columns,
        };
        let fingerprint = fingerprint_of(&body)?;
        Ok(Self { body, fingerprint })
    }

    /// Recompute the fingerprint and check format version
    pub fn verify(&self) -> Result<()> {
        if self.body.format_version != MANIFEST_FORMAT_VERSION {
            return Err(Error::schema_mismatch(format!(
                "unsupported manifest format version {} (expected {})",
                self.body.format_version, MANIFEST_FORMAT_VERSION
            )));
        }

        let actual = fingerprint_of(&self.body)?;
        if actual != self.fingerprint {
            return Err(Error::schema_mismatch(format!(
                "manifest fingerprint {} does not match its content ({})",
                self.fingerprint, actual
            )));
        }
        Ok(())
    }

    /// Hex SHA-256 fingerprint used to pair manifests with models
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Version label of the schema the manifest was fit against
    pub fn schema_version(&self) -> &str {
        &self.body.schema_version
    }

    /// Encoding policy in force when the manifest was fit
    pub fn policy(&self) -> &EncoderConfig {
        &self.body.policy
    }

    /// Output columns in fixed order
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.body.columns
    }

    /// Column names in fixed order
    pub fn column_names(&self) -> Vec<&str> {
        self.body.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of output columns; every encoded vector has exactly this length
    pub fn width(&self) -> usize {
        self.body.columns.len()
    }

    /// Field specs as narrowed at fit time, in canonical order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.body.fields
    }

    /// Observed training range of a numeric field
    pub fn observed_range(&self, field: &str) -> Option<Bounds> {
        self.body.observed_ranges.get(field).copied()
    }

    /// The registry implied by this manifest, used to validate serving input.
    ///
    /// Multi-category fields only allow values observed during fit, so a
    /// category the model never saw is rejected at validation time.
    pub fn serving_registry(&self) -> Result<SchemaRegistry> {
        SchemaRegistry::new(self.body.schema_version.clone(), self.body.fields.clone())
    }

    /// Number of columns produced per field kind
    pub fn kind_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for spec in &self.body.fields {
            let n = self.body.columns.iter().filter(|c| c.field == spec.name).count();
            let key = match spec.kind {
                FieldKind::Binary => "binary",
                FieldKind::MultiCategory => "one_hot",
                FieldKind::Numeric => "numeric",
            };
            *counts.entry(key.to_string()).or_insert(0) += n;
        }
        counts
    }
}

fn fingerprint_of(body: &ManifestBody) -> Result<String> {
    let canonical = serde_json::to_vec(body)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}
