//! Attribute aggregation and lookup.
//!
//! This module folds the flat `(group, type, data)` attribute records of a
//! single listing into a [`NormalizedAttributeMap`] and answers point
//! lookups over that map.

use crate::models::{AttributeRecord, Lookup, NormalizeStats, NormalizedAttributeMap};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Groups merged into the output, in lookup precedence order.
pub const ALLOWED_GROUPS: [&str; 10] = [
    "amenities",
    "service options",
    "food options",
    "parking",
    "payments",
    "atmosphere",
    "highlights",
    "offerings",
    "food and drink",
    "planning",
];

/// Group that receives ungrouped records.
pub const FALLBACK_GROUP: &str = "amenities";

/// Group that is never aggregated.
pub const EXCLUDED_GROUP: &str = "accessibility";

/// Sole key of the junk objects some scrapes produce.
const PLACEHOLDER_KEY: &str = "undefined";

/// Errors returned for structurally invalid input.
#[derive(Debug, Error, PartialEq)]
pub enum AttributeError {
    #[error("expected a list of attribute records, found {0}")]
    NotAList(&'static str),

    #[error("element {index} is not an attribute record: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("records belong to more than one owner ({first}, {second})")]
    MixedOwners { first: String, second: String },

    #[error("attribute record {record_id} has no owner")]
    MissingOwner { record_id: String },
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Merged,
    Malformed,
    Empty,
    Placeholder,
    Excluded,
    Unlisted,
}

/// Normalize all attribute records of one owner.
#[allow(dead_code)] // Library entry point; the CLI needs the stats variant
pub fn normalize(records: &[AttributeRecord]) -> Result<NormalizedAttributeMap, AttributeError> {
    normalize_with_stats(records).map(|(map, _)| map)
}

/// Normalize all attribute records of one owner, reporting what was dropped.
///
/// Records are applied in slice order, so when two records write the same
/// `(group, key)` the later one wins. Bad records are counted, never fatal.
pub fn normalize_with_stats(
    records: &[AttributeRecord],
) -> Result<(NormalizedAttributeMap, NormalizeStats), AttributeError> {
    ensure_single_owner(records)?;

    let mut map = NormalizedAttributeMap::new();
    let mut stats = NormalizeStats::default();

    for record in records {
        match merge_record(&mut map, record) {
            Outcome::Merged => stats.merged += 1,
            Outcome::Malformed => stats.malformed += 1,
            Outcome::Empty => stats.empty += 1,
            Outcome::Placeholder => stats.placeholder += 1,
            Outcome::Excluded => stats.excluded += 1,
            Outcome::Unlisted => stats.unlisted += 1,
        }
    }

    Ok((map, stats))
}

/// Normalize an untyped JSON value that should hold a list of records.
#[allow(dead_code)] // Library entry point for untyped callers
pub fn normalize_value(value: &Value) -> Result<NormalizedAttributeMap, AttributeError> {
    let records = records_from_value(value)?;
    normalize(&records)
}

/// Read a JSON array into attribute records.
pub fn records_from_value(value: &Value) -> Result<Vec<AttributeRecord>, AttributeError> {
    let elements = value
        .as_array()
        .ok_or_else(|| AttributeError::NotAList(value_kind(value)))?;

    elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            AttributeRecord::deserialize(element).map_err(|e| AttributeError::InvalidRecord {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Look up one attribute across every group.
///
/// Groups are searched in [`ALLOWED_GROUPS`] order, then any other group in
/// lexicographic order. A value wrapped in an object keyed by its own name
/// (`{"hasTv": {"hasTv": true}}`) is unwrapped one level.
pub fn extract(map: &NormalizedAttributeMap, key: &str) -> Lookup {
    for group in search_order(map) {
        if let Some(value) = map.group(group).and_then(|entries| entries.get(key)) {
            return Lookup::Present(unwrap_self_keyed(value, key).clone());
        }
    }
    Lookup::Absent
}

/// Split records by owner, keeping input order within each owner.
pub fn partition_by_owner(
    records: Vec<AttributeRecord>,
) -> Result<BTreeMap<String, Vec<AttributeRecord>>, AttributeError> {
    let mut partitions: BTreeMap<String, Vec<AttributeRecord>> = BTreeMap::new();

    for record in records {
        let owner = match record.owner_id.clone() {
            Some(owner) if !owner.trim().is_empty() => owner,
            _ => {
                return Err(AttributeError::MissingOwner {
                    record_id: record.id,
                })
            }
        };
        partitions.entry(owner).or_default().push(record);
    }

    Ok(partitions)
}

/// Whether a payload is the `{"undefined": ...}` scraping artifact.
pub fn is_placeholder_payload(value: &Value) -> bool {
    match value {
        Value::Object(entries) => entries.len() == 1 && entries.contains_key(PLACEHOLDER_KEY),
        _ => false,
    }
}

/// Lower-case and trim a group label. Blank labels count as ungrouped.
pub fn normalize_group(group: Option<&str>) -> Option<String> {
    let trimmed = group?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

pub fn is_allowed_group(group: &str) -> bool {
    ALLOWED_GROUPS.contains(&group)
}

fn merge_record(map: &mut NormalizedAttributeMap, record: &AttributeRecord) -> Outcome {
    let value = match parse_payload(record.data.as_deref()) {
        Ok(Some(value)) => value,
        Ok(None) => return Outcome::Empty,
        Err(_) => return Outcome::Malformed,
    };

    let group = match normalize_group(record.group.as_deref()) {
        Some(group) if group == EXCLUDED_GROUP => return Outcome::Excluded,
        Some(group) if !is_allowed_group(&group) => return Outcome::Unlisted,
        Some(group) => group,
        None => FALLBACK_GROUP.to_string(),
    };

    if is_placeholder_payload(&value) {
        return Outcome::Placeholder;
    }

    match value {
        Value::Object(entries) => {
            for (key, value) in entries {
                map.insert(&group, &key, value);
            }
        }
        other => map.insert(&group, &record.attr_type, other),
    }

    Outcome::Merged
}

/// Parse a payload, mapping blank, null and empty-object payloads to `None`.
fn parse_payload(data: Option<&str>) -> Result<Option<Value>, serde_json::Error> {
    let text = match data.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(None),
    };

    let value: Value = serde_json::from_str(text)?;
    Ok(match value {
        Value::Null => None,
        Value::String(ref s) if s.is_empty() => None,
        Value::Object(ref entries) if entries.is_empty() => None,
        value => Some(value),
    })
}

fn ensure_single_owner(records: &[AttributeRecord]) -> Result<(), AttributeError> {
    let mut owners = records.iter().filter_map(|r| r.owner_id.as_deref());

    if let Some(first) = owners.next() {
        if let Some(second) = owners.find(|owner| *owner != first) {
            return Err(AttributeError::MixedOwners {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }

    Ok(())
}

fn search_order(map: &NormalizedAttributeMap) -> Vec<&str> {
    let mut order: Vec<&str> = ALLOWED_GROUPS
        .iter()
        .copied()
        .filter(|group| map.group(group).is_some())
        .collect();

    order.extend(
        map.groups()
            .map(|(name, _)| name.as_str())
            .filter(|name| !is_allowed_group(name)),
    );

    order
}

fn unwrap_self_keyed<'a>(value: &'a Value, key: &str) -> &'a Value {
    match value {
        Value::Object(inner) => inner.get(key).unwrap_or(value),
        _ => value,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(group: Option<&str>, attr_type: &str, data: &str) -> AttributeRecord {
        AttributeRecord::new(attr_type, group, attr_type, data)
    }

    fn map_of(value: Value) -> NormalizedAttributeMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_object_payload_keys_are_merged() {
        let records = vec![record(
            Some("Service options"),
            "serviceOptions",
            r#"{"dineIn": true, "takeout": true, "delivery": false}"#,
        )];

        let map = normalize(&records).unwrap();
        let group = map.group("service options").unwrap();

        assert_eq!(group.len(), 3);
        assert_eq!(group.get("dineIn"), Some(&json!(true)));
        assert_eq!(group.get("delivery"), Some(&json!(false)));
    }

    #[test]
    fn test_scalar_payload_keyed_by_type() {
        let records = vec![record(Some("payments"), "acceptsCash", "true")];
        let map = normalize(&records).unwrap();
        assert_eq!(map, map_of(json!({"payments": {"acceptsCash": true}})));
    }

    #[test]
    fn test_array_payload_keyed_by_type() {
        let records = vec![record(Some("offerings"), "cuisines", r#"["sushi","dim sum"]"#)];
        let map = normalize(&records).unwrap();
        assert_eq!(
            map,
            map_of(json!({"offerings": {"cuisines": ["sushi", "dim sum"]}}))
        );
    }

    #[test]
    fn test_accessibility_never_appears() {
        let records = vec![
            record(Some("Accessibility "), "wheelchair", "true"),
            record(Some("ACCESSIBILITY"), "ramp", r#"{"ramp": true}"#),
            record(Some("accessibility"), "lift", "false"),
        ];

        let (map, stats) = normalize_with_stats(&records).unwrap();
        assert!(map.is_empty());
        assert_eq!(stats.excluded, 3);
    }

    #[test]
    fn test_malformed_payload_dropped() {
        let records = vec![record(Some("amenities"), "x", "{not json")];
        let (map, stats) = normalize_with_stats(&records).unwrap();
        assert!(map.is_empty());
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn test_empty_payloads_dropped() {
        let mut missing = record(Some("amenities"), "a", "");
        missing.data = None;
        let records = vec![
            missing,
            record(Some("amenities"), "b", "   "),
            record(Some("amenities"), "c", "null"),
            record(Some("amenities"), "d", r#""""#),
            record(Some("amenities"), "e", "{}"),
        ];

        let (map, stats) = normalize_with_stats(&records).unwrap();
        assert!(map.is_empty());
        assert_eq!(stats.empty, 5);
        assert_eq!(stats.merged, 0);
    }

    #[test]
    fn test_placeholder_payload_dropped() {
        let records = vec![
            record(Some("amenities"), "junk", r#"{"undefined": true}"#),
            record(None, "junk", r#"{"undefined": "yes"}"#),
        ];

        let (map, stats) = normalize_with_stats(&records).unwrap();
        assert!(map.is_empty());
        assert_eq!(stats.placeholder, 2);
    }

    #[test]
    fn test_accessibility_placeholder_counts_as_excluded() {
        let records = vec![record(Some("Accessibility"), "junk", r#"{"undefined": true}"#)];

        let (map, stats) = normalize_with_stats(&records).unwrap();
        assert!(map.is_empty());
        assert_eq!(stats.excluded, 1);
        assert_eq!(stats.placeholder, 0);
    }

    #[test]
    fn test_ungrouped_falls_back_to_amenities() {
        let records = vec![record(None, "hasTv", "true")];
        let map = normalize(&records).unwrap();
        assert_eq!(map, map_of(json!({"amenities": {"hasTv": true}})));
    }

    #[test]
    fn test_blank_group_is_ungrouped() {
        let records = vec![record(Some("  "), "wifi", r#""free""#)];
        let map = normalize(&records).unwrap();
        assert_eq!(map, map_of(json!({"amenities": {"wifi": "free"}})));
    }

    #[test]
    fn test_ungrouped_object_keys_merged() {
        let records = vec![record(None, "hasTv", r#"{"hasTv": true}"#)];
        let map = normalize(&records).unwrap();
        assert_eq!(map, map_of(json!({"amenities": {"hasTv": true}})));
        assert_eq!(extract(&map, "hasTv"), Lookup::Present(json!(true)));
    }

    #[test]
    fn test_ungrouped_multi_key_object_extractable() {
        let records = vec![record(
            None,
            "amenities",
            r#"{"hasTv": true, "wifi": "free"}"#,
        )];

        let map = normalize(&records).unwrap();
        assert_eq!(
            map,
            map_of(json!({"amenities": {"hasTv": true, "wifi": "free"}}))
        );
        assert_eq!(extract(&map, "hasTv"), Lookup::Present(json!(true)));
        assert_eq!(extract(&map, "wifi"), Lookup::Present(json!("free")));
        assert!(extract(&map, "amenities").is_absent());
    }

    #[test]
    fn test_unlisted_group_dropped() {
        let records = vec![record(Some("crowd"), "familyFriendly", "true")];
        let (map, stats) = normalize_with_stats(&records).unwrap();
        assert!(map.is_empty());
        assert_eq!(stats.unlisted, 1);
    }

    #[test]
    fn test_later_record_wins() {
        let records = vec![
            record(Some("parking"), "parking", r#"{"freeLot": false, "valet": true}"#),
            record(Some("Parking"), "parking", r#"{"freeLot": true}"#),
        ];

        let map = normalize(&records).unwrap();
        assert_eq!(
            map,
            map_of(json!({"parking": {"freeLot": true, "valet": true}}))
        );
    }

    #[test]
    fn test_case_insensitive_merge_excludes_accessibility() {
        let records = vec![
            record(Some("Parking"), "freeParking", "true"),
            record(Some("parking"), "freeLot", "true"),
            record(Some("Accessibility"), "wheelchair", "true"),
        ];

        let map = normalize(&records).unwrap();
        assert_eq!(
            map,
            map_of(json!({"parking": {"freeParking": true, "freeLot": true}}))
        );
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let records = vec![
            record(Some("Amenities"), "hasTv", "true"),
            record(None, "allowsDogs", "false"),
            record(Some("Highlights"), "highlights", r#"{"fastService": true}"#),
        ];

        assert_eq!(normalize(&records).unwrap(), normalize(&records).unwrap());
    }

    #[test]
    fn test_mixed_owners_rejected() {
        let records = vec![
            record(Some("amenities"), "hasTv", "true").owned_by("b1"),
            record(Some("amenities"), "wifi", "true").owned_by("b2"),
        ];

        let err = normalize(&records).unwrap_err();
        assert_eq!(
            err,
            AttributeError::MixedOwners {
                first: "b1".to_string(),
                second: "b2".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_value_rejects_non_list() {
        let err = normalize_value(&json!({"group": "amenities"})).unwrap_err();
        assert_eq!(err, AttributeError::NotAList("an object"));
    }

    #[test]
    fn test_normalize_value_reports_bad_element() {
        let err = normalize_value(&json!([{"id": "a", "type": "hasTv"}, 42])).unwrap_err();
        assert!(matches!(err, AttributeError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn test_normalize_value_accepts_list() {
        let value = json!([
            {"id": "a", "group": "Payments", "type": "creditCards", "data": "true"},
            {"id": "b", "type": "hasTv", "data": true}
        ]);

        let map = normalize_value(&value).unwrap();
        assert_eq!(
            map,
            map_of(json!({
                "amenities": {"hasTv": true},
                "payments": {"creditCards": true}
            }))
        );
    }

    #[test]
    fn test_extract_unwraps_one_level() {
        let map = map_of(json!({"amenities": {"hasTv": {"hasTv": true}}}));
        assert_eq!(extract(&map, "hasTv"), Lookup::Present(json!(true)));
    }

    #[test]
    fn test_extract_unwraps_only_one_level() {
        let map = map_of(json!({"amenities": {"hasTv": {"hasTv": {"hasTv": true}}}}));
        assert_eq!(
            extract(&map, "hasTv"),
            Lookup::Present(json!({"hasTv": true}))
        );
    }

    #[test]
    fn test_extract_keeps_foreign_objects() {
        let map = map_of(json!({"parking": {"lot": {"free": true}}}));
        assert_eq!(
            extract(&map, "lot"),
            Lookup::Present(json!({"free": true}))
        );
    }

    #[test]
    fn test_extract_false_is_not_absent() {
        let records = vec![record(Some("amenities"), "hasTv", "false")];
        let map = normalize(&records).unwrap();

        assert_eq!(extract(&map, "hasTv"), Lookup::Present(json!(false)));
        assert_eq!(extract(&normalize(&[]).unwrap(), "hasTv"), Lookup::Absent);
    }

    #[test]
    fn test_extract_prefers_allow_list_order() {
        let map = map_of(json!({
            "atmosphere": {"casual": "atmosphere"},
            "amenities": {"casual": "amenities"},
            "aaa": {"casual": "aaa"}
        }));
        assert_eq!(extract(&map, "casual"), Lookup::Present(json!("amenities")));

        let map = map_of(json!({
            "zzz": {"casual": "zzz"},
            "aaa": {"casual": "aaa"}
        }));
        assert_eq!(extract(&map, "casual"), Lookup::Present(json!("aaa")));
    }

    #[test]
    fn test_partition_by_owner() {
        let records = vec![
            record(Some("amenities"), "hasTv", "true").owned_by("b2"),
            record(Some("amenities"), "wifi", "true").owned_by("b1"),
            record(Some("parking"), "freeLot", "true").owned_by("b2"),
        ];

        let partitions = partition_by_owner(records).unwrap();
        assert_eq!(partitions.len(), 2);

        let b2: Vec<_> = partitions["b2"].iter().map(|r| r.attr_type.as_str()).collect();
        assert_eq!(b2, vec!["hasTv", "freeLot"]);
    }

    #[test]
    fn test_partition_requires_owner() {
        let records = vec![record(Some("amenities"), "hasTv", "true")];
        let err = partition_by_owner(records).unwrap_err();
        assert_eq!(
            err,
            AttributeError::MissingOwner {
                record_id: "hasTv".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_group() {
        assert_eq!(normalize_group(Some(" Food And Drink ")), Some("food and drink".to_string()));
        assert_eq!(normalize_group(Some("")), None);
        assert_eq!(normalize_group(None), None);
    }
}
