//! Coverage audit over normalized listings.
//!
//! Answers the recurring data-quality questions in one pass: which listings
//! have no usable attributes, how often each inspected amenity is recorded
//! as true, false or not at all, and how populated each group is.

use super::aggregator::{extract, normalize_with_stats, AttributeError};
use crate::models::{
    AttributeRecord, AuditSummary, GroupCoverage, KeyCoverage, NormalizeStats, OwnerAudit,
};
use std::collections::BTreeMap;

/// Audit the records of a single listing.
pub fn audit_owner(
    owner_id: &str,
    records: &[AttributeRecord],
    keys: &[String],
) -> Result<OwnerAudit, AttributeError> {
    let (attributes, stats) = normalize_with_stats(records)?;

    let flags = keys
        .iter()
        .map(|key| (key.clone(), extract(&attributes, key).as_flag()))
        .collect();

    Ok(OwnerAudit {
        owner_id: owner_id.to_string(),
        record_count: records.len(),
        attributes,
        flags,
        stats,
    })
}

/// Summarize per-listing audits.
///
/// `max_listed` caps the list of listings reported as missing attributes;
/// the count is always exact.
pub fn summarize(audits: &[OwnerAudit], keys: &[String], max_listed: usize) -> AuditSummary {
    let mut coverage: Vec<KeyCoverage> = keys.iter().map(|k| KeyCoverage::new(k)).collect();
    let mut groups: BTreeMap<String, GroupCoverage> = BTreeMap::new();
    let mut key_frequency: BTreeMap<String, usize> = BTreeMap::new();
    let mut stats = NormalizeStats::default();
    let mut missing: Vec<String> = Vec::new();
    let mut records_total = 0;

    for audit in audits {
        records_total += audit.record_count;
        stats += audit.stats;

        if audit.is_missing_attributes() {
            missing.push(audit.owner_id.clone());
        }

        for entry in coverage.iter_mut() {
            if let Some(flag) = audit.flags.get(&entry.key) {
                entry.record(*flag);
            }
        }

        for (name, entries) in audit.attributes.groups() {
            let group = groups.entry(name.clone()).or_insert_with(|| GroupCoverage {
                group: name.clone(),
                ..GroupCoverage::default()
            });
            group.owners += 1;
            group.keys += entries.len();

            for key in entries.keys() {
                *key_frequency.entry(key.clone()).or_default() += 1;
            }
        }
    }

    let owners_without_attributes = missing.len();
    missing.sort();
    missing.truncate(max_listed);

    let mut groups: Vec<GroupCoverage> = groups.into_values().collect();
    groups.sort_by_key(|g| std::cmp::Reverse(g.owners));

    AuditSummary {
        owners_total: audits.len(),
        owners_with_attributes: audits.len() - owners_without_attributes,
        owners_without_attributes,
        records_total,
        stats,
        keys: coverage,
        groups,
        missing_owners: missing,
        key_frequency,
    }
}

/// The most common attribute keys, highest count first.
pub fn top_keys(summary: &AuditSummary, n: usize) -> Vec<(String, usize)> {
    let mut keys: Vec<(String, usize)> = summary
        .key_frequency
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();

    keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    keys.truncate(n);
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Flag;

    fn keys() -> Vec<String> {
        vec!["hasTv".to_string(), "freeLot".to_string()]
    }

    fn audit(owner: &str, records: Vec<AttributeRecord>) -> OwnerAudit {
        let records: Vec<_> = records.into_iter().map(|r| r.owned_by(owner)).collect();
        audit_owner(owner, &records, &keys()).unwrap()
    }

    #[test]
    fn test_audit_owner_flags() {
        let result = audit(
            "b1",
            vec![
                AttributeRecord::new("1", Some("Amenities"), "hasTv", "false"),
                AttributeRecord::new("2", Some("Accessibility"), "wheelchair", "true"),
            ],
        );

        assert_eq!(result.flags["hasTv"], Flag::False);
        assert_eq!(result.flags["freeLot"], Flag::Absent);
        assert_eq!(result.stats.excluded, 1);
        assert_eq!(result.record_count, 2);
    }

    #[test]
    fn test_summarize_counts_missing_owners() {
        let audits = vec![
            audit(
                "b2",
                vec![AttributeRecord::new("1", Some("amenities"), "x", "{broken")],
            ),
            audit(
                "b1",
                vec![AttributeRecord::new("2", Some("parking"), "freeLot", "true")],
            ),
            audit("b3", vec![]),
        ];

        let summary = summarize(&audits, &keys(), 10);

        assert_eq!(summary.owners_total, 3);
        assert_eq!(summary.owners_with_attributes, 1);
        assert_eq!(summary.owners_without_attributes, 2);
        assert_eq!(summary.missing_owners, vec!["b2", "b3"]);
        assert_eq!(summary.stats.malformed, 1);
        assert_eq!(summary.records_total, 2);
    }

    #[test]
    fn test_summarize_caps_listed_owners() {
        let audits = vec![audit("b1", vec![]), audit("b2", vec![]), audit("b3", vec![])];
        let summary = summarize(&audits, &keys(), 2);

        assert_eq!(summary.owners_without_attributes, 3);
        assert_eq!(summary.missing_owners.len(), 2);
    }

    #[test]
    fn test_summarize_key_and_group_coverage() {
        let audits = vec![
            audit(
                "b1",
                vec![
                    AttributeRecord::new("1", None, "hasTv", "true"),
                    AttributeRecord::new("2", Some("Parking"), "parking", r#"{"freeLot": true}"#),
                ],
            ),
            audit(
                "b2",
                vec![AttributeRecord::new("3", Some("amenities"), "hasTv", "false")],
            ),
        ];

        let summary = summarize(&audits, &keys(), 10);

        let tv = &summary.keys[0];
        assert_eq!((tv.true_count, tv.false_count, tv.absent_count), (1, 1, 0));
        let lot = &summary.keys[1];
        assert_eq!((lot.true_count, lot.absent_count), (1, 1));

        assert_eq!(summary.groups[0].group, "amenities");
        assert_eq!(summary.groups[0].owners, 2);
        assert_eq!(summary.key_frequency.get("hasTv"), Some(&2));
        assert_eq!(top_keys(&summary, 1), vec![("hasTv".to_string(), 2)]);
    }

    #[test]
    fn test_key_frequency_sorted_by_key() {
        let audits = vec![
            audit(
                "b1",
                vec![
                    AttributeRecord::new("1", Some("amenities"), "wifi", "true"),
                    AttributeRecord::new("2", Some("parking"), "freeLot", "true"),
                    AttributeRecord::new("3", Some("amenities"), "hasTv", "true"),
                ],
            ),
        ];

        let summary = summarize(&audits, &keys(), 10);
        let json = serde_json::to_value(&summary).unwrap();

        let order: Vec<&String> = json["key_frequency"].as_object().unwrap().keys().collect();
        assert_eq!(order, vec!["freeLot", "hasTv", "wifi"]);
    }
}
