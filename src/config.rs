//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.buffetattrs.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".buffetattrs.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Audit settings.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Number of listings normalized concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "attribute_audit.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Coverage audit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Attribute keys whose true/false/absent distribution is reported.
    #[serde(default = "default_keys")]
    pub keys: Vec<String>,

    /// Maximum listings named in the "missing attributes" section.
    #[serde(default = "default_max_listed")]
    pub max_listed_owners: usize,

    /// Exit with code 2 when any payload fails to parse.
    #[serde(default)]
    pub fail_on_malformed: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            keys: default_keys(),
            max_listed_owners: default_max_listed(),
            fail_on_malformed: false,
        }
    }
}

fn default_keys() -> Vec<String> {
    vec![
        "hasTv",
        "allowsDogs",
        "wifi",
        "freeParking",
        "dineIn",
        "takeout",
        "delivery",
        "goodForKids",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_listed() -> usize {
    50
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include every listing's normalized map in the report.
    #[serde(default)]
    pub include_owner_maps: bool,

    /// Number of most common attribute keys listed.
    #[serde(default = "default_top_keys")]
    pub top_keys: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_owner_maps: false,
            top_keys: default_top_keys(),
        }
    }
}

fn default_top_keys() -> usize {
    15
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if let Some(ref keys) = args.keys {
            self.audit.keys = keys.clone();
        }
        if let Some(max_listed) = args.max_listed {
            self.audit.max_listed_owners = max_listed;
        }
        if args.fail_on_malformed {
            self.audit.fail_on_malformed = true;
        }

        if args.include_owner_maps {
            self.report.include_owner_maps = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
