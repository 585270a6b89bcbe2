//! Configuration management for the CLI.
//!
//! Lookup order: `--config`, then `./paperkg.toml`, then
//! `~/.paperkg/config.toml`, else built-in defaults. Flags and environment
//! variables override file values.

use crate::cli::{BatchArgs, DirArgs};
use crate::error::{CliError, Result};
use paperkg_extractor::ExtractorConfig;
use paperkg_llm::Vendor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "paperkg.toml";

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Input and output locations
    #[serde(default)]
    pub paths: Paths,

    /// Extraction settings
    #[serde(default)]
    pub extraction: ExtractorConfig,

    /// Display settings
    #[serde(default)]
    pub settings: Settings,
}

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Papers directory
    pub papers_dir: PathBuf,

    /// Prompt template directory
    pub prompt_dir: PathBuf,

    /// Root of per-vendor output directories
    pub output_dir: PathBuf,

    /// Root of per-vendor log directories
    pub log_dir: PathBuf,

    /// Schema JSON file
    pub schema_file: PathBuf,
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
}

impl Config {
    /// Home-directory configuration path.
    pub fn user_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".paperkg").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(CliError::Config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Self::from_file(&local);
        }

        match Self::user_path() {
            Ok(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply directory flags.
    pub fn apply_dirs(&mut self, dirs: &DirArgs) {
        let paths = &mut self.paths;
        override_with(&mut paths.papers_dir, &dirs.papers_dir);
        override_with(&mut paths.prompt_dir, &dirs.prompt_dir);
        override_with(&mut paths.output_dir, &dirs.output_dir);
        override_with(&mut paths.log_dir, &dirs.log_dir);
        override_with(&mut paths.schema_file, &dirs.schema_file);
    }

    /// Apply batch sizing flags.
    pub fn apply_batch(&mut self, batch: &BatchArgs) {
        let extraction = &mut self.extraction;
        override_with(&mut extraction.first_batch_size, &batch.first_batch_size);
        override_with(&mut extraction.in_scope_limit, &batch.in_scope_limit);
        if batch.only_priority {
            extraction.only_priority = true;
        }
    }

    /// Validate extraction settings.
    pub fn validate(&self) -> Result<()> {
        self.extraction.validate().map_err(CliError::Config)
    }

    /// `<output_dir>/<vendor>`
    pub fn vendor_output_dir(&self, vendor: Vendor) -> PathBuf {
        self.paths.output_dir.join(vendor.as_str())
    }

    /// `<log_dir>/<vendor>`
    pub fn vendor_log_dir(&self, vendor: Vendor) -> PathBuf {
        self.paths.log_dir.join(vendor.as_str())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            papers_dir: PathBuf::from("papers"),
            prompt_dir: PathBuf::from("prompts"),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            schema_file: PathBuf::from("schema.json"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn override_with<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
