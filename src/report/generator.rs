//! Markdown and JSON report generation.
//!
//! This module renders an [`AuditReport`] for humans (Markdown) or for
//! downstream tooling (JSON). Attributes that were never collected are
//! always shown as such and never folded into "no".

use crate::analysis::top_keys;
use crate::models::{AuditReport, AuditSummary, KeyCoverage, OwnerAudit, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AuditReport, top_key_count: usize) -> String {
    let mut output = String::new();

    output.push_str("# Attribute Audit Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_key_coverage_section(&report.summary.keys));
    output.push_str(&generate_group_section(&report.summary, top_key_count));
    output.push_str(&generate_missing_section(&report.summary));

    if !report.owners.is_empty() {
        output.push_str(&generate_owner_maps_section(&report.owners));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Audit Date:** {}\n",
        metadata.audit_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Listings Audited:** {}\n", metadata.owners_audited));
    section.push_str(&format!("- **Records Read:** {}\n", metadata.records_read));
    section.push_str(&format!(
        "- **Audit Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &AuditSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Listings | With Attributes | Missing Attributes |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} |\n\n",
        summary.owners_total, summary.owners_with_attributes, summary.owners_without_attributes
    ));

    let stats = &summary.stats;
    section.push_str("### Records\n\n");
    section.push_str("| Outcome | Records |\n");
    section.push_str("|:---|:---:|\n");
    section.push_str(&format!("| Merged | {} |\n", stats.merged));
    section.push_str(&format!("| Malformed payload | {} |\n", stats.malformed));
    section.push_str(&format!("| Empty payload | {} |\n", stats.empty));
    section.push_str(&format!("| Placeholder payload | {} |\n", stats.placeholder));
    section.push_str(&format!("| Accessibility (excluded) | {} |\n", stats.excluded));
    section.push_str(&format!("| Unlisted group | {} |\n", stats.unlisted));
    section.push_str(&format!("| **Total** | **{}** |\n\n", stats.total()));

    section
}

/// Generate the per-key coverage table.
fn generate_key_coverage_section(keys: &[KeyCoverage]) -> String {
    if keys.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Key Coverage\n\n");
    section.push_str("| Key | Yes | No | Other | Not Collected |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");

    for key in keys {
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            key.key, key.true_count, key.false_count, key.other_count, key.absent_count
        ));
    }
    section.push('\n');

    section
}

/// Generate the group coverage and key frequency tables.
fn generate_group_section(summary: &AuditSummary, top_key_count: usize) -> String {
    let mut section = String::new();

    if !summary.groups.is_empty() {
        section.push_str("## Group Coverage\n\n");
        section.push_str("| Group | Listings | Keys |\n");
        section.push_str("|:---|:---:|:---:|\n");

        for group in &summary.groups {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                group.group, group.owners, group.keys
            ));
        }
        section.push('\n');
    }

    let top = top_keys(summary, top_key_count);
    if !top.is_empty() {
        section.push_str("### Most Common Attributes\n\n");
        section.push_str("| Key | Listings |\n");
        section.push_str("|:---|:---:|\n");

        for (key, count) in top {
            section.push_str(&format!("| `{}` | {} |\n", key, count));
        }
        section.push('\n');
    }

    section
}

/// Generate the missing-attributes section.
fn generate_missing_section(summary: &AuditSummary) -> String {
    let mut section = String::new();

    section.push_str("## Listings Missing Attributes\n\n");

    if summary.owners_without_attributes == 0 {
        section.push_str("Every listing has at least one normalized attribute.\n\n");
        return section;
    }

    for owner in &summary.missing_owners {
        section.push_str(&format!("- `{}`\n", owner));
    }

    let hidden = summary.owners_without_attributes - summary.missing_owners.len();
    if hidden > 0 {
        section.push_str(&format!("- ...and {} more\n", hidden));
    }
    section.push('\n');

    section
}

/// Generate the per-listing attribute maps.
fn generate_owner_maps_section(owners: &[OwnerAudit]) -> String {
    let mut section = String::new();

    section.push_str("## Listing Attributes\n\n");

    for owner in owners {
        section.push_str(&format!(
            "### {}\n\n*Records: {} | Merged: {} | Dropped: {}*\n\n",
            owner.owner_id,
            owner.record_count,
            owner.stats.merged,
            owner.stats.dropped()
        ));

        let rendered = serde_json::to_string_pretty(&owner.attributes)
            .unwrap_or_else(|_| "{}".to_string());
        section.push_str("```json\n");
        section.push_str(&rendered);
        section.push_str("\n```\n\n");
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by buffet-attrs*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AuditReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
