//! CLI command definitions and argument parsing.

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use paperkg_llm::Vendor;
use std::path::PathBuf;

/// paperkg - Extract knowledge graphs from research papers with an LLM.
#[derive(Debug, Parser)]
#[command(name = "paperkg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PAPERKG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Human-readable tables (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract a knowledge graph from every paper
    Extract(ExtractArgs),

    /// Show how papers would be split into batches
    Plan(PlanArgs),

    /// Summarize extraction outputs
    Stats(StatsArgs),
}

/// Directory overrides shared by all commands.
#[derive(Debug, Clone, Default, Args)]
pub struct DirArgs {
    /// Papers directory (with `priority/` and `general/` subdirectories)
    #[arg(long, env = "PAPERKG_PAPERS_DIR")]
    pub papers_dir: Option<PathBuf>,

    /// Prompt template directory
    #[arg(long, env = "PAPERKG_PROMPT_DIR")]
    pub prompt_dir: Option<PathBuf>,

    /// Root of per-vendor output directories
    #[arg(long, env = "PAPERKG_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Root of per-vendor log directories
    #[arg(long, env = "PAPERKG_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Schema JSON file
    #[arg(long, env = "PAPERKG_SCHEMA_FILE")]
    pub schema_file: Option<PathBuf>,
}

/// Batch sizing overrides shared by `extract` and `plan`.
#[derive(Debug, Clone, Default, Args)]
pub struct BatchArgs {
    /// Number of priority papers in the trial batch
    #[arg(long, env = "FIRST_BATCH_SIZE")]
    pub first_batch_size: Option<usize>,

    /// Priority papers beyond this position join the general batch
    #[arg(long, env = "IN_SCOPE_LIMIT")]
    pub in_scope_limit: Option<usize>,

    /// Skip general papers
    #[arg(long, env = "EXTRACT_ONLY_PRIORITY", value_parser = BoolishValueParser::new())]
    pub only_priority: bool,
}

/// Arguments for the extract command.
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Vendor: deepseek, gemini (hiapi) or kimi (moonshot)
    #[arg(value_parser = parse_vendor)]
    pub vendor: Vendor,

    #[command(flatten)]
    pub dirs: DirArgs,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// Base URL override (normalized to end in /v1)
    #[arg(long, env = "PAPERKG_BASE_URL")]
    pub base_url: Option<String>,

    /// Model override
    #[arg(long, env = "PAPERKG_MODEL")]
    pub model: Option<String>,

    /// Maximum attempts per paper
    #[arg(long, env = "EXTRACT_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Pause after each paper sent to the model, in seconds
    #[arg(long, env = "EXTRACT_SLEEP_SECS")]
    pub sleep_secs: Option<f64>,

    /// Prompt template used instead of the default (relative to the prompt directory)
    #[arg(long, env = "EXTRACT_PROMPT_FILE")]
    pub prompt_file: Option<PathBuf>,

    /// Comma-separated schema fields forwarded into prompts
    #[arg(long, env = "EXTRACT_SCHEMA_FIELDS")]
    pub schema_fields: Option<String>,

    /// Output hint appended to every prompt
    #[arg(long, env = "EXTRACT_JSON_HINT")]
    pub json_hint: Option<String>,

    /// Skip the /models credential check
    #[arg(long, env = "EXTRACT_SKIP_PREFLIGHT", value_parser = BoolishValueParser::new())]
    pub skip_preflight: bool,

    /// Continue past the trial batch without asking: y/yes or n/no
    #[arg(long, env = "AUTO_CONTINUE_REST")]
    pub auto_continue: Option<String>,
}

/// Arguments for the plan command.
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub dirs: DirArgs,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// Also show which papers already have output for this vendor
    #[arg(long, value_parser = parse_vendor)]
    pub vendor: Option<Vendor>,
}

/// Arguments for the stats command.
#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Vendor whose outputs to summarize
    #[arg(value_parser = parse_vendor)]
    pub vendor: Vendor,

    #[command(flatten)]
    pub dirs: DirArgs,

    /// List every document, not only totals
    #[arg(short, long)]
    pub verbose: bool,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

fn parse_vendor(s: &str) -> std::result::Result<Vendor, String> {
    s.parse::<Vendor>().map_err(|e| e.to_string())
}
