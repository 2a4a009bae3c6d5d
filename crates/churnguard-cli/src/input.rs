//! Record files: a JSON array or one JSON object per line
//!
//! Training files carry a `Churn` label per record (`"Yes"`/`"No"` or
//! `1`/`0`). Fields the schema does not name, such as a customer id, are
//! carried along and ignored by validation.

use churnguard_core::{Error, FieldValue, LabeledRecord, RawRecord, Result};
use churnguard_pipeline::DataLoader;
use std::path::{Path, PathBuf};

/// Name of the label column in training files
pub const LABEL_FIELD: &str = "Churn";

/// Read every record in `path`
pub fn read_records(path: &Path) -> Result<Vec<RawRecord>> {
    let content = std::fs::read_to_string(path)?;
    parse_records(&content)
}

/// Parse a JSON array or JSON-lines document
pub fn parse_records(content: &str) -> Result<Vec<RawRecord>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::config(format!("line {}: {e}", i + 1)))
        })
        .collect()
}

/// Split the label off a record
pub fn split_label(mut record: RawRecord, position: usize) -> Result<LabeledRecord> {
    let churned = match record.remove(LABEL_FIELD) {
        Some(FieldValue::Text(s)) if s == "Yes" => true,
        Some(FieldValue::Text(s)) if s == "No" => false,
        Some(FieldValue::Number(n)) if n == 1.0 => true,
        Some(FieldValue::Number(n)) if n == 0.0 => false,
        Some(other) => {
            return Err(Error::config(format!(
                "record {position}: {LABEL_FIELD} must be \"Yes\"/\"No\" or 1/0, got {other}"
            )))
        }
        None => {
            return Err(Error::config(format!(
                "record {position}: missing {LABEL_FIELD} label"
            )))
        }
    };
    Ok(LabeledRecord::new(record, churned))
}

/// Training data loader over a JSON / JSON-lines file
#[derive(Debug, Clone)]
pub struct JsonLinesLoader {
    path: PathBuf,
}

impl JsonLinesLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DataLoader for JsonLinesLoader {
    fn load(&self) -> Result<Vec<LabeledRecord>> {
        read_records(&self.path)?
            .into_iter()
            .enumerate()
            .map(|(i, record)| split_label(record, i))
            .collect()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
