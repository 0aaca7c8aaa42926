//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// buffet-attrs - amenity attribute normalizer and auditor
///
/// Folds the flat attribute records of each buffet listing into a nested
/// amenity map and reports how well each amenity is covered.
///
/// Examples:
///   buffet-attrs --input attributes.json
///   buffet-attrs --input attributes.json --keys hasTv,allowsDogs --format json
///   buffet-attrs --input attributes.json --owner buffet-123 --key hasTv
///   buffet-attrs --input attributes.json --dry-run
///   buffet-attrs --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON export of the attribute records
    ///
    /// A top-level array of `{id, group, type, data, ownerId}` objects.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "BUFFET_ATTRS_INPUT",
        required_unless_present = "init_config"
    )]
    pub input: Option<PathBuf>,

    /// Inspect a single listing and print its normalized attributes
    #[arg(long, value_name = "ID")]
    pub owner: Option<String>,

    /// Attribute to look up for the inspected listing
    #[arg(long, value_name = "KEY", requires = "owner")]
    pub key: Option<String>,

    /// Attribute keys to report coverage for (comma-separated)
    ///
    /// Example: --keys hasTv,allowsDogs,freeParking
    #[arg(long, value_name = "KEYS", value_delimiter = ',')]
    pub keys: Option<Vec<String>>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .buffetattrs.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of listings normalized concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Maximum listings named in the missing-attributes section
    #[arg(long, value_name = "COUNT")]
    pub max_listed: Option<usize>,

    /// Include every listing's normalized map in the report
    #[arg(long)]
    pub include_owner_maps: bool,

    /// Exit with code 2 if any attribute payload fails to parse
    ///
    /// Useful for scheduled data-quality checks.
    #[arg(long)]
    pub fail_on_malformed: bool,

    /// Dry run: load and partition the export without auditing
    ///
    /// Shows how many records each listing has and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .buffetattrs.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.key.is_some() && self.owner.is_none() {
            return Err("--key requires --owner".to_string());
        }

        if let Some(ref keys) = self.keys {
            if keys.iter().any(|k| k.trim().is_empty()) {
                return Err("Attribute keys must not be empty".to_string());
            }
        }

        match self.input {
            Some(ref input) if !input.exists() => {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            Some(ref input) if !input.is_file() => {
                return Err(format!("Input path is not a file: {}", input.display()));
            }
            Some(_) => {}
            None => return Err("An --input export file is required".to_string()),
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
