//! Raw record to feature vector encoding

use crate::manifest::{ColumnDescriptor, ColumnEncoding, FeatureManifest};
use churnguard_core::{
    Error, FeatureVector, FieldKind, FieldValue, RawRecord, Result, ValidatedBatch,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Encoding policy, fixed into the manifest at fit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Emit N-1 indicator columns per multi-category field, dropping the
    /// lexicographically first value
    #[serde(default)]
    pub drop_first: bool,

    /// Clip numeric values to the range observed in training
    #[serde(default)]
    pub clip_numeric: bool,
}

/// Fits feature manifests and applies them to records
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    /// Create an encoder with the given policy
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Policy this encoder fits with
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Derive the column layout from a validated training batch.
    ///
    /// Fields are laid out in registry order. Binary fields map their
    /// lexicographically first allowed value to 0. Multi-category fields get
    /// one `field=value` column per observed value, sorted. Numeric fields
    /// pass through and remember their observed range.
    pub fn fit(&self, batch: &ValidatedBatch) -> Result<FeatureManifest> {
        let registry = batch.registry();
        let profile = batch.profile();

        let mut fields = Vec::with_capacity(registry.len());
        let mut observed_ranges = BTreeMap::new();
        let mut columns = Vec::new();

        for spec in registry.all_fields() {
            match spec.kind {
                FieldKind::Binary => {
                    columns.push(ColumnDescriptor::binary(spec)?);
                    fields.push(spec.clone());
                }
                FieldKind::MultiCategory => {
                    let observed = profile.observed_categories(&spec.name).ok_or_else(|| {
                        Error::internal(format!("no observed values for field '{}'", spec.name))
                    })?;
                    let narrowed = spec.narrowed_to(observed);
                    let skip = usize::from(self.config.drop_first);
                    columns.extend(
                        narrowed
                            .allowed_values
                            .iter()
                            .skip(skip)
                            .map(|value| ColumnDescriptor::indicator(&spec.name, value)),
                    );
                    fields.push(narrowed);
                }
                FieldKind::Numeric => {
                    let range = profile.numeric_range(&spec.name).ok_or_else(|| {
                        Error::internal(format!("no observed range for field '{}'", spec.name))
                    })?;
                    observed_ranges.insert(spec.name.clone(), range);
                    let clip = self.config.clip_numeric.then_some(range);
                    columns.push(ColumnDescriptor::numeric(&spec.name, clip));
                    fields.push(spec.clone());
                }
            }
        }

        let manifest = FeatureManifest::seal(
            registry.version(),
            self.config,
            fields,
            observed_ranges,
            columns,
        )?;

        info!(
            schema = manifest.schema_version(),
            columns = manifest.width(),
            records = batch.len(),
            fingerprint = manifest.fingerprint(),
            "feature manifest fit"
        );

        Ok(manifest)
    }

    /// Encode one record with a frozen manifest.
    ///
    /// Fails with `SchemaMismatch` if the record carries a value the manifest
    /// cannot represent. An unseen category is never encoded as an all-zero
    /// one-hot row.
    pub fn apply(record: &RawRecord, manifest: &FeatureManifest) -> Result<FeatureVector> {
        check_representable(record, manifest)?;

        let mut values = Vec::with_capacity(manifest.width());
        for column in manifest.columns() {
            values.push(encode_column(record, column)?);
        }

        debug_assert_eq!(values.len(), manifest.width());
        Ok(FeatureVector::new(values))
    }

    /// Encode many records; the first failure aborts the batch
    pub fn apply_batch<'a>(
        records: impl IntoIterator<Item = &'a RawRecord>,
        manifest: &FeatureManifest,
    ) -> Result<Vec<FeatureVector>> {
        let vectors = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                Self::apply(record, manifest).map_err(|e| match e {
                    Error::SchemaMismatch(msg) => {
                        Error::schema_mismatch(format!("record {i}: {msg}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(records = vectors.len(), width = manifest.width(), "encoded batch");
        Ok(vectors)
    }
}

fn check_representable(record: &RawRecord, manifest: &FeatureManifest) -> Result<()> {
    for spec in manifest.fields() {
        let value = record.get(&spec.name).ok_or_else(|| {
            Error::schema_mismatch(format!("record has no value for field '{}'", spec.name))
        })?;

        match (spec.kind, value) {
            (FieldKind::Binary | FieldKind::MultiCategory, FieldValue::Text(s)) => {
                if !spec.allows(s) {
                    return Err(Error::schema_mismatch(format!(
                        "value {s:?} of field '{}' was not seen when the manifest was fit",
                        spec.name
                    )));
                }
            }
            (FieldKind::Numeric, FieldValue::Number(n)) if n.is_finite() => {}
            (kind, other) => {
                return Err(Error::schema_mismatch(format!(
                    "field '{}' expects a {kind} value, got {other}",
                    spec.name
                )));
            }
        }
    }
    Ok(())
}

fn encode_column(record: &RawRecord, column: &ColumnDescriptor) -> Result<f64> {
    let value = record.get(&column.field).ok_or_else(|| {
        Error::schema_mismatch(format!("record has no value for field '{}'", column.field))
    })?;

    match (&column.encoding, value) {
        (ColumnEncoding::Binary { zero, one }, FieldValue::Text(s)) => {
            if s == zero {
                Ok(0.0)
            } else if s == one {
                Ok(1.0)
            } else {
                Err(Error::schema_mismatch(format!(
                    "value {s:?} is not part of the binary mapping of '{}'",
                    column.field
                )))
            }
        }
        (ColumnEncoding::Indicator { value: expected }, FieldValue::Text(s)) => {
            Ok(if s == expected { 1.0 } else { 0.0 })
        }
        (ColumnEncoding::Numeric { clip }, FieldValue::Number(n)) => {
            Ok(clip.map_or(*n, |bounds| bounds.clip(*n)))
        }
        (_, other) => Err(Error::schema_mismatch(format!(
            "column '{}' cannot encode {other}",
            column.name
        ))),
    }
}
