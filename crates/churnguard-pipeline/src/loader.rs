//! Raw-data loader seam
//!
//! Loading records from files, databases or feature stores belongs to the
//! caller. The training pipeline only sees this trait.

use churnguard_core::{LabeledRecord, Result};

/// Source of labeled training records
pub trait DataLoader {
    /// Load the full training batch
    fn load(&self) -> Result<Vec<LabeledRecord>>;

    /// Human-readable description for logs
    fn describe(&self) -> String {
        "unnamed loader".to_string()
    }
}

/// Loader over records already in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    records: Vec<LabeledRecord>,
}

impl InMemoryLoader {
    /// Wrap a batch of records
    pub fn new(records: Vec<LabeledRecord>) -> Self {
        Self { records }
    }
}

impl DataLoader for InMemoryLoader {
    fn load(&self) -> Result<Vec<LabeledRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory batch of {} records", self.records.len())
    }
}
