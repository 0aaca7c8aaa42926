//! buffet-attrs - amenity attribute normalizer and auditor
//!
//! A CLI tool that folds the structured attribute records of each buffet
//! listing into a nested amenity map and reports attribute coverage.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (unreadable export, invalid records, bad config, etc.)
//!   2 - Malformed payloads found with --fail-on-malformed set

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod source;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use models::{AuditReport, AuditSummary, OwnerAudit, ReportMetadata};
use source::{JsonExportSource, RecordSource};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("buffet-attrs v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Audit failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .buffetattrs.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize audited keys, output and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the requested workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input = args
        .input
        .clone()
        .context("An --input export file is required")?;

    // Step 1: Load and partition the export
    let source = JsonExportSource::load(&input).await?;
    info!(
        "Loaded {} records for {} listings",
        source.record_count(),
        source.owners().len()
    );

    if args.dry_run {
        return Ok(handle_dry_run(&source));
    }

    if let Some(ref owner) = args.owner {
        return handle_inspect(&source, owner, args.key.as_deref());
    }

    // Step 2: Audit every listing
    let source: Arc<dyn RecordSource> = Arc::new(source);
    let keys = Arc::new(config.audit.keys.clone());

    println!(
        "🔬 Auditing {} listings ({} keys)...",
        source.owners().len(),
        keys.len()
    );
    let audits = audit_all(
        Arc::clone(&source),
        keys,
        config.general.concurrency,
        !args.quiet,
    )
    .await?;

    // Step 3: Summarize
    let summary = analysis::summarize(
        &audits,
        &config.audit.keys,
        config.audit.max_listed_owners,
    );

    if summary.stats.dropped() > 0 {
        warn!(
            "Dropped {} of {} records ({} malformed, {} empty, {} placeholder, {} accessibility, {} unlisted group)",
            summary.stats.dropped(),
            summary.stats.total(),
            summary.stats.malformed,
            summary.stats.empty,
            summary.stats.placeholder,
            summary.stats.excluded,
            summary.stats.unlisted
        );
    }

    let metadata = ReportMetadata {
        source: input.display().to_string(),
        audit_date: Utc::now(),
        owners_audited: audits.len(),
        records_read: source.record_count(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let report = AuditReport {
        metadata,
        summary,
        owners: if config.report.include_owner_maps {
            audits
        } else {
            Vec::new()
        },
    };

    // Step 4: Generate and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, config.report.top_keys),
    };

    let output_path = Path::new(&config.general.output);
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    let summary = &report.summary;
    println!("\n📊 Audit Summary:");
    println!("   Listings: {}", summary.owners_total);
    println!(
        "   With attributes: {} | Missing attributes: {}",
        summary.owners_with_attributes, summary.owners_without_attributes
    );
    println!(
        "   Records merged: {} | dropped: {}",
        summary.stats.merged,
        summary.stats.dropped()
    );
    println!(
        "\n✅ Audit complete! Report saved to: {}",
        output_path.display()
    );

    let code = exit_code(summary, config.audit.fail_on_malformed);
    if code == 2 {
        eprintln!(
            "\n⛔ {} malformed attribute payloads found. Failing (exit code 2).",
            summary.stats.malformed
        );
    }

    Ok(code)
}

/// Exit code for a finished audit: 2 when malformed payloads should fail the run.
fn exit_code(summary: &AuditSummary, fail_on_malformed: bool) -> i32 {
    if fail_on_malformed && summary.stats.malformed > 0 {
        2
    } else {
        0
    }
}

/// Normalize and audit every listing of the source concurrently.
async fn audit_all(
    source: Arc<dyn RecordSource>,
    keys: Arc<Vec<String>>,
    concurrency: usize,
    show_progress: bool,
) -> Result<Vec<OwnerAudit>> {
    let owners = source.owners();

    let progress_bar = if show_progress {
        let pb = ProgressBar::new(owners.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut tasks = stream::iter(owners)
        .map(|owner| {
            let source = Arc::clone(&source);
            let keys = Arc::clone(&keys);

            tokio::task::spawn_blocking(move || -> Result<OwnerAudit> {
                let records = source.records_for(&owner)?;
                let audit = analysis::audit_owner(&owner, &records, &keys)
                    .with_context(|| format!("Failed to audit listing {}", owner))?;
                Ok(audit)
            })
        })
        .buffer_unordered(concurrency.max(1));

    let mut audits = Vec::new();
    while let Some(joined) = tasks.next().await {
        let audit = joined.context("Audit task panicked")??;

        if audit.stats.malformed > 0 {
            debug!(
                "Listing {} has {} malformed payloads",
                audit.owner_id, audit.stats.malformed
            );
        }
        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
        audits.push(audit);
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    audits.sort_by(|a, b| a.owner_id.cmp(&b.owner_id));
    Ok(audits)
}

/// Handle --owner: print one listing's normalized attributes.
fn handle_inspect(source: &JsonExportSource, owner: &str, key: Option<&str>) -> Result<i32> {
    let records = source.records_for(owner)?;
    if records.is_empty() {
        warn!("No attribute records found for listing {}", owner);
    }

    let (attributes, stats) = analysis::normalize_with_stats(&records)
        .with_context(|| format!("Failed to normalize listing {}", owner))?;

    println!("\n🏷️  Listing {} ({} records)\n", owner, records.len());
    println!("{}", serde_json::to_string_pretty(&attributes)?);
    println!(
        "\n   Merged: {} | Malformed: {} | Empty: {} | Placeholder: {} | Accessibility: {} | Unlisted: {}",
        stats.merged, stats.malformed, stats.empty, stats.placeholder, stats.excluded, stats.unlisted
    );

    if let Some(key) = key {
        let lookup = analysis::extract(&attributes, key);
        if lookup.is_absent() {
            debug!("Key {} was not collected for listing {}", key, owner);
        }
        println!("\n   {} = {}", key, lookup);
    }

    Ok(0)
}

/// Handle --dry-run: list listings and their record counts, then exit.
fn handle_dry_run(source: &JsonExportSource) -> i32 {
    println!("\n🔍 Dry run: export loaded, nothing audited.\n");

    let counts = source.owner_counts();
    if counts.is_empty() {
        println!("   No attribute records found.");
    } else {
        for (owner, count) in &counts {
            println!("     🏷️  {} ({} records)", owner, count);
        }
        println!(
            "\n   Total: {} listings, {} records",
            counts.len(),
            source.record_count()
        );
    }

    println!("\n✅ Dry run complete.");
    0
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
