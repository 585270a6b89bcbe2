//! paperkg Extractor
//!
//! Turns a corpus of Markdown papers into one knowledge-graph JSON file per
//! paper by prompting a language model.
//!
//! # Overview
//!
//! A run discovers the papers, splits them into batches (a small trial batch
//! first), resolves a prompt template for each paper, calls the model through
//! a [`paperkg_llm::ModelClient`] and repairs the reply into JSON. Every paper
//! produces exactly one log entry; the run log is written once at the end.
//!
//! # Architecture
//!
//! ```text
//! Corpus → BatchPlan → PromptResolver → ModelClient → repair → <id>.json
//!                                                          ↘ ExtractionLogger
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use paperkg_extractor::{
//!     ContinuationPolicy, Corpus, ExtractorConfig, Orchestrator, OutputLayout, PromptResolver,
//! };
//! use paperkg_llm::{MockProvider, ModelClient, RequestOptions, RetryPolicy};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ModelClient::new(
//!     MockProvider::new(r#"{"entities": [], "relations": []}"#),
//!     RetryPolicy::default(),
//!     RequestOptions::default(),
//! );
//! let orchestrator = Orchestrator::new(
//!     client,
//!     PromptResolver::new("prompts"),
//!     ExtractorConfig::default(),
//!     OutputLayout::new("out/mock", "logs/mock"),
//! )?;
//!
//! let corpus = Corpus::discover(Path::new("papers"))?;
//! let report = orchestrator
//!     .run(&corpus, &mut ContinuationPolicy::AlwaysContinue)
//!     .await?;
//!
//! println!("Extracted: {} / {}", report.stats.successful, report.stats.total_papers);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod prompt;
pub mod repair;
pub mod run_log;
pub mod schema;
pub mod stats;
pub mod types;

pub use config::ExtractorConfig;
pub use corpus::Corpus;
pub use error::ExtractorError;
pub use orchestrator::{
    Checkpoint, ContinuationPolicy, Orchestrator, OutputLayout, RunContext, RunReport, StopReason,
};
pub use plan::{Batch, BatchKind, BatchPlan};
pub use prompt::{PromptResolver, PromptSource, ResolvedPrompt};
pub use repair::parse_model_json;
pub use run_log::{EntryStatus, ExtractionLogger, LogEntry, RunStats, RunSummary};
pub use stats::OutputStats;
pub use types::{ExtractionResult, ExtractionTask, SkipReason};
