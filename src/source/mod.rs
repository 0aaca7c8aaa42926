//! Attribute record sources.
//!
//! A [`RecordSource`] hands the audit every attribute record of one listing
//! at a time. Sources are built once per run and passed in explicitly.

use crate::analysis::{partition_by_owner, records_from_value};
use crate::models::AttributeRecord;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Supplies attribute records grouped by owning listing.
pub trait RecordSource: Send + Sync {
    /// All owner identifiers known to the source, in a stable order.
    fn owners(&self) -> Vec<String>;

    /// Every record of one owner. Must never return a partial set.
    fn records_for(&self, owner_id: &str) -> Result<Vec<AttributeRecord>>;

    /// Total number of records across all owners.
    fn record_count(&self) -> usize;
}

/// Records read from a JSON export of the attributes collection.
#[derive(Debug, Clone, Default)]
pub struct JsonExportSource {
    path: Option<PathBuf>,
    partitions: BTreeMap<String, Vec<AttributeRecord>>,
    record_count: usize,
}

impl JsonExportSource {
    /// Load an export file holding a JSON array of attribute records.
    pub async fn load(path: &Path) -> Result<Self> {
        info!("Loading attribute export: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read export file: {}", path.display()))?;

        let mut source = Self::parse(&content)
            .with_context(|| format!("Failed to parse export file: {}", path.display()))?;
        source.path = Some(path.to_path_buf());

        Ok(source)
    }

    /// Parse export content.
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content).context("Export is not valid JSON")?;
        let records = records_from_value(&value)?;
        Self::from_records(records)
    }

    /// Build a source from in-memory records.
    pub fn from_records(records: Vec<AttributeRecord>) -> Result<Self> {
        let record_count = records.len();
        let partitions = partition_by_owner(records)?;

        debug!(
            "Partitioned {} records across {} owners",
            record_count,
            partitions.len()
        );

        Ok(Self {
            path: None,
            partitions,
            record_count,
        })
    }

    /// Path the source was loaded from, if any.
    #[allow(dead_code)]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Owner identifiers with their record counts.
    pub fn owner_counts(&self) -> Vec<(&str, usize)> {
        self.partitions
            .iter()
            .map(|(owner, records)| (owner.as_str(), records.len()))
            .collect()
    }
}

impl RecordSource for JsonExportSource {
    fn owners(&self) -> Vec<String> {
        self.partitions.keys().cloned().collect()
    }

    fn records_for(&self, owner_id: &str) -> Result<Vec<AttributeRecord>> {
        Ok(self
            .partitions
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }

    fn record_count(&self) -> usize {
        self.record_count
    }
}
