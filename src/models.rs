//! Data models for the attribute auditor.
//!
//! This module contains the core data structures used throughout the
//! application: raw attribute records as exported from the listings
//! database, the normalized per-owner attribute map, lookup results and
//! the audit report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

/// A single `(group, type, data)` attribute describing one buffet listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRecord {
    /// Opaque unique identifier.
    pub id: String,
    /// Free-text category label (e.g. "Amenities", "Parking").
    #[serde(default)]
    pub group: Option<String>,
    /// Attribute name, used as the leaf key (e.g. "hasTv").
    #[serde(rename = "type")]
    pub attr_type: String,
    /// JSON-encoded payload. Not guaranteed to be well-formed.
    #[serde(default, deserialize_with = "payload_as_text")]
    pub data: Option<String>,
    /// Identifier of the listing this attribute belongs to.
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl AttributeRecord {
    /// Creates a record with no owner.
    #[allow(dead_code)] // Builder utility
    pub fn new(id: &str, group: Option<&str>, attr_type: &str, data: &str) -> Self {
        Self {
            id: id.to_string(),
            group: group.map(String::from),
            attr_type: attr_type.to_string(),
            data: Some(data.to_string()),
            owner_id: None,
        }
    }

    /// Sets the owner of this record.
    #[allow(dead_code)] // Builder utility
    pub fn owned_by(mut self, owner_id: &str) -> Self {
        self.owner_id = Some(owner_id.to_string());
        self
    }
}

/// Some exports store `data` as a JSON string, others inline the decoded
/// value. Both are kept as text so they share one parse path.
fn payload_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Per-owner attribute map: normalized group name to attribute key to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedAttributeMap {
    groups: BTreeMap<String, BTreeMap<String, Value>>,
}

impl NormalizedAttributeMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a single key under a group, replacing any earlier value.
    pub fn insert(&mut self, group: &str, key: &str, value: Value) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Returns the entries of one group.
    pub fn group(&self, name: &str) -> Option<&BTreeMap<String, Value>> {
        self.groups.get(name)
    }

    /// Iterates groups in lexicographic order.
    pub fn groups(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Value>)> {
        self.groups.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of keys across all groups.
    #[allow(dead_code)] // Utility for statistics
    pub fn key_count(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }
}

/// Result of looking up a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The attribute was recorded with this value.
    Present(Value),
    /// No such attribute was recorded for the listing.
    Absent,
}

impl Lookup {
    pub fn is_absent(&self) -> bool {
        matches!(self, Lookup::Absent)
    }

    /// Returns the stored value, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Lookup::Present(value) => Some(value),
            Lookup::Absent => None,
        }
    }

    /// Classifies the lookup as a boolean amenity flag.
    pub fn as_flag(&self) -> Flag {
        match self.value() {
            Some(Value::Bool(true)) => Flag::True,
            Some(Value::Bool(false)) => Flag::False,
            Some(_) => Flag::Other,
            None => Flag::Absent,
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Present(value) => write!(f, "{}", value),
            Lookup::Absent => write!(f, "not collected"),
        }
    }
}

/// Boolean view of an attribute used by amenity flags and coverage counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    True,
    False,
    /// Recorded, but not as a boolean.
    Other,
    Absent,
}

/// Why records were kept or dropped during normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeStats {
    /// Records that contributed at least one key.
    pub merged: usize,
    /// Payloads that failed to parse as JSON.
    pub malformed: usize,
    /// Missing, blank, JSON-null or empty-object payloads.
    pub empty: usize,
    /// Objects whose only key is `"undefined"`.
    pub placeholder: usize,
    /// Records in the accessibility group.
    pub excluded: usize,
    /// Records whose group is not on the allow-list.
    pub unlisted: usize,
}

impl NormalizeStats {
    /// Number of records that were dropped for any reason.
    pub fn dropped(&self) -> usize {
        self.malformed + self.empty + self.placeholder + self.excluded + self.unlisted
    }

    pub fn total(&self) -> usize {
        self.merged + self.dropped()
    }
}

impl AddAssign for NormalizeStats {
    fn add_assign(&mut self, other: Self) {
        self.merged += other.merged;
        self.malformed += other.malformed;
        self.empty += other.empty;
        self.placeholder += other.placeholder;
        self.excluded += other.excluded;
        self.unlisted += other.unlisted;
    }
}

/// Audit result for a single listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerAudit {
    pub owner_id: String,
    pub record_count: usize,
    pub attributes: NormalizedAttributeMap,
    /// Inspected key to its flag.
    pub flags: BTreeMap<String, Flag>,
    pub stats: NormalizeStats,
}

impl OwnerAudit {
    /// Whether normalization produced no attributes at all.
    pub fn is_missing_attributes(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Distribution of one inspected key across all listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCoverage {
    pub key: String,
    pub true_count: usize,
    pub false_count: usize,
    pub other_count: usize,
    pub absent_count: usize,
}

impl KeyCoverage {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, flag: Flag) {
        match flag {
            Flag::True => self.true_count += 1,
            Flag::False => self.false_count += 1,
            Flag::Other => self.other_count += 1,
            Flag::Absent => self.absent_count += 1,
        }
    }

    /// Number of listings where the key was recorded at all.
    #[allow(dead_code)] // Utility for statistics
    pub fn present(&self) -> usize {
        self.true_count + self.false_count + self.other_count
    }
}

/// How widely one group is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCoverage {
    pub group: String,
    /// Listings with at least one key in this group.
    pub owners: usize,
    /// Keys in this group summed over all listings.
    pub keys: usize,
}

/// Aggregated statistics across all audited listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSummary {
    pub owners_total: usize,
    pub owners_with_attributes: usize,
    pub owners_without_attributes: usize,
    pub records_total: usize,
    pub stats: NormalizeStats,
    pub keys: Vec<KeyCoverage>,
    pub groups: Vec<GroupCoverage>,
    /// Sorted, capped list of listings with no normalized attributes.
    pub missing_owners: Vec<String>,
    /// Distinct attribute keys seen, with the number of listings carrying each.
    pub key_frequency: BTreeMap<String, usize>,
}

/// Metadata about the audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the attribute export that was audited.
    pub source: String,
    pub audit_date: DateTime<Utc>,
    pub owners_audited: usize,
    pub records_read: usize,
    pub duration_seconds: f64,
}

/// The complete attribute audit report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub metadata: ReportMetadata,
    pub summary: AuditSummary,
    /// Per-listing detail, only filled when requested.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub owners: Vec<OwnerAudit>,
}
