//! Per-document task and result types

use crate::prompt::PromptSource;
use paperkg_domain::{DocumentSource, TokenUsage};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Why a document was not sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The output file already exists
    OutputExists,

    /// No prompt template resolved
    NoPrompt,
}

impl SkipReason {
    /// Reason string recorded in the run log
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::OutputExists => "exists",
            SkipReason::NoPrompt => "no_prompt_found",
        }
    }
}

/// One scheduled document
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    /// Document to extract
    pub document: DocumentSource,

    /// Template provenance, once resolved
    pub prompt_source: Option<PromptSource>,

    /// Target `<id>.json` path
    pub output_path: PathBuf,

    /// 1-based batch index
    pub batch_index: usize,
}

impl ExtractionTask {
    /// Schedule `document`, writing into `output_dir`
    pub fn new(document: DocumentSource, output_dir: &Path, batch_index: usize) -> Self {
        let output_path = output_dir.join(format!("{}.json", document.id));
        Self {
            document,
            prompt_source: None,
            output_path,
            batch_index,
        }
    }

    /// `<id>.failed.txt` next to the output
    pub fn failure_marker_path(&self) -> PathBuf {
        self.sibling("failed.txt")
    }

    /// `<id>.raw.txt` next to the output
    pub fn raw_output_path(&self) -> PathBuf {
        self.sibling("raw.txt")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        self.output_path
            .with_file_name(format!("{}.{}", self.document.id, suffix))
    }
}

/// Outcome of one task; exactly one per scheduled document
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    /// JSON was produced and written
    Success {
        /// Parsed graph
        parsed: Value,
        /// Token usage of the successful attempt
        usage: Option<TokenUsage>,
        /// Wall time for the document
        duration: Duration,
        /// Attempts used
        attempts: u32,
    },

    /// All attempts failed; a failure marker was written
    Failure {
        /// Last error
        error: String,
        /// Attempts used (0 if the model was never called)
        attempts: u32,
        /// Wall time for the document
        duration: Duration,
    },

    /// The document was not processed
    Skipped {
        /// Why
        reason: SkipReason,
    },

    /// The account balance ran out; the run must stop
    AbortedBalance {
        /// Vendor error
        error: String,
        /// Attempts used
        attempts: u32,
        /// Wall time for the document
        duration: Duration,
    },
}

impl ExtractionResult {
    /// Whether the model was called for this document
    pub fn reached_model(&self) -> bool {
        match self {
            ExtractionResult::Success { .. } | ExtractionResult::AbortedBalance { .. } => true,
            ExtractionResult::Failure { attempts, .. } => *attempts > 0,
            ExtractionResult::Skipped { .. } => false,
        }
    }

    /// Whether the run must stop after this document
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractionResult::AbortedBalance { .. })
    }
}
