//! Extraction run log
//!
//! Every processed document appends one [`LogEntry`]. The whole run is
//! written once, as a single pretty-printed JSON file, when the run ends.

use crate::error::ExtractorError;
use crate::types::SkipReason;
use chrono::{DateTime, Local, Utc};
use paperkg_domain::{RunId, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Status recorded for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// JSON written
    Success,

    /// All attempts failed
    Failed,

    /// Not processed (existing output or no prompt)
    Skipped,

    /// Stopped by an exhausted account balance
    AbortedBalance,
}

/// One document's record in the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Category-relative document path
    pub paper: String,

    /// When the entry was recorded (UTC)
    pub timestamp: DateTime<Utc>,

    /// Wall time, rounded to milliseconds
    pub duration_seconds: f64,

    /// Whether the document counts as extracted
    pub success: bool,

    /// Detailed status
    pub status: EntryStatus,

    /// Error message for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Prompt tokens, when reported
    pub prompt_tokens: Option<u64>,

    /// Completion tokens, when reported
    pub completion_tokens: Option<u64>,

    /// Total tokens, when reported
    pub total_tokens: Option<u64>,

    /// Entities in the extracted graph
    pub entity_count: usize,

    /// Relations in the extracted graph
    pub relation_count: usize,

    /// Model-call attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,

    /// Template provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_source: Option<String>,

    /// Output file written or found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Failure marker written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_flag: Option<String>,

    /// Raw model output saved for inspection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,

    /// Vendor finish reason of the final attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Completion-token cap of the final attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Why the document was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LogEntry {
    fn base(paper: impl Into<String>, status: EntryStatus, success: bool, duration: Duration) -> Self {
        Self {
            paper: paper.into(),
            timestamp: Utc::now(),
            duration_seconds: round_to(duration.as_secs_f64(), 3),
            success,
            status,
            error: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            entity_count: 0,
            relation_count: 0,
            attempts: None,
            prompt_source: None,
            output: None,
            fail_flag: None,
            raw_output: None,
            finish_reason: None,
            max_tokens: None,
            reason: None,
        }
    }

    /// A successful extraction
    pub fn success(paper: impl Into<String>, duration: Duration, graph: &Value, usage: Option<TokenUsage>) -> Self {
        let (entity_count, relation_count) = count_graph_elements(graph);
        let mut entry = Self::base(paper, EntryStatus::Success, true, duration);
        entry.entity_count = entity_count;
        entry.relation_count = relation_count;
        entry.with_usage(usage)
    }

    /// A document that never reached the model
    ///
    /// Only [`SkipReason::OutputExists`] counts as successful; a missing
    /// prompt is neither success nor failure.
    pub fn skipped(paper: impl Into<String>, reason: SkipReason, output: Option<&Path>) -> Self {
        let success = reason == SkipReason::OutputExists;
        let mut entry = Self::base(paper, EntryStatus::Skipped, success, Duration::ZERO);
        entry.reason = Some(reason.as_str().to_string());
        entry.output = output.map(|p| p.display().to_string());
        entry
    }

    /// A document whose attempts all failed
    pub fn failed(paper: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        let mut entry = Self::base(paper, EntryStatus::Failed, false, duration);
        entry.error = Some(error.into());
        entry
    }

    /// A document stopped by an exhausted balance
    pub fn aborted_balance(paper: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        let mut entry = Self::base(paper, EntryStatus::AbortedBalance, false, duration);
        entry.error = Some(error.into());
        entry
    }

    /// Record token usage; `None` leaves the counts null
    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        if let Some(usage) = usage {
            self.prompt_tokens = Some(usage.prompt);
            self.completion_tokens = Some(usage.completion);
            self.total_tokens = Some(usage.total);
        }
        self
    }

    /// Record the attempt count
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Record the template provenance
    pub fn with_prompt_source(mut self, source: impl Into<String>) -> Self {
        self.prompt_source = Some(source.into());
        self
    }

    /// Record the output path
    pub fn with_output(mut self, path: &Path) -> Self {
        self.output = Some(path.display().to_string());
        self
    }

    /// Record the failure marker path
    pub fn with_fail_flag(mut self, path: &Path) -> Self {
        self.fail_flag = Some(path.display().to_string());
        self
    }

    /// Record the raw-output path
    pub fn with_raw_output(mut self, path: &Path) -> Self {
        self.raw_output = Some(path.display().to_string());
        self
    }

    /// Record finish reason and token cap of the final attempt
    pub fn with_generation(mut self, finish_reason: Option<String>, max_tokens: Option<u32>) -> Self {
        self.finish_reason = finish_reason;
        self.max_tokens = max_tokens;
        self
    }
}

/// Counters derived from the entries so far
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunStats {
    /// Documents planned for the run
    pub total_papers: usize,

    /// Successful extractions, including skipped existing outputs
    pub successful: usize,

    /// Failures and balance aborts
    pub failed: usize,

    /// Skipped documents of either kind
    pub skipped: usize,

    /// Whether the run was stopped by an exhausted balance
    pub aborted_for_balance: bool,

    /// `successful / total_papers * 100`, rounded to 2 decimals
    pub success_rate: f64,
}

/// Persisted form of a run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identity (UUIDv7)
    pub run_id: String,

    /// Vendor name
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// When the run started (UTC)
    pub started_at: DateTime<Utc>,

    /// When the log was written (UTC)
    pub finished_at: DateTime<Utc>,

    /// Documents planned for the run
    pub total_papers: usize,

    /// Successful extractions
    pub successful_extractions: usize,

    /// Failed extractions
    pub failed_extractions: usize,

    /// Skipped documents
    pub skipped_extractions: usize,

    /// Whether the run was stopped by an exhausted balance
    pub aborted_for_balance: bool,

    /// Success percentage, 2 decimals
    pub success_rate: f64,

    /// Entries in processing order
    pub logs: Vec<LogEntry>,
}

/// Append-only collector for one run
#[derive(Debug)]
pub struct ExtractionLogger {
    log_dir: PathBuf,
    file_stem: String,
    run_id: RunId,
    provider: String,
    model: String,
    started_at: DateTime<Utc>,
    total_papers: usize,
    successful: usize,
    failed: usize,
    skipped: usize,
    aborted_for_balance: bool,
    logs: Vec<LogEntry>,
}

impl ExtractionLogger {
    /// Start a log for a run; nothing is written until [`save`](Self::save)
    pub fn new(
        log_dir: impl Into<PathBuf>,
        run_id: RunId,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let file_stem = format!("extraction_log_{}", Local::now().format("%Y%m%d_%H%M%S"));
        Self {
            log_dir: log_dir.into(),
            file_stem,
            run_id,
            provider: provider.into(),
            model: model.into(),
            started_at: Utc::now(),
            total_papers: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            aborted_for_balance: false,
            logs: Vec::new(),
        }
    }

    /// Run identity
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Set the number of planned documents
    pub fn set_total(&mut self, total: usize) {
        self.total_papers = total;
    }

    /// Append an entry and update counters
    pub fn add_entry(&mut self, entry: LogEntry) {
        match entry.status {
            EntryStatus::Skipped => {
                self.skipped += 1;
                if entry.success {
                    self.successful += 1;
                }
            }
            EntryStatus::Success => self.successful += 1,
            EntryStatus::Failed => self.failed += 1,
            EntryStatus::AbortedBalance => {
                self.failed += 1;
                self.aborted_for_balance = true;
            }
        }
        self.logs.push(entry);
    }

    /// Entries so far
    pub fn entries(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Current counters
    ///
    /// # Examples
    ///
    /// ```
    /// use paperkg_domain::RunId;
    /// use paperkg_extractor::run_log::{ExtractionLogger, LogEntry};
    /// use std::time::Duration;
    ///
    /// let mut logger = ExtractionLogger::new("logs", RunId::new(), "mock", "mock-model");
    /// logger.set_total(3);
    /// logger.add_entry(LogEntry::success("priority/a.md", Duration::from_secs(2), &serde_json::json!({}), None));
    /// logger.add_entry(LogEntry::failed("priority/b.md", Duration::from_secs(5), "bad json"));
    ///
    /// let stats = logger.summary();
    /// assert_eq!(stats.successful, 1);
    /// assert_eq!(stats.failed, 1);
    /// assert_eq!(stats.success_rate, 33.33);
    /// ```
    pub fn summary(&self) -> RunStats {
        let success_rate = if self.total_papers > 0 {
            round_to(self.successful as f64 / self.total_papers as f64 * 100.0, 2)
        } else {
            0.0
        };
        RunStats {
            total_papers: self.total_papers,
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
            aborted_for_balance: self.aborted_for_balance,
            success_rate,
        }
    }

    /// Build the persisted form, stamped with the current time
    pub fn to_summary(&self) -> RunSummary {
        let stats = self.summary();
        RunSummary {
            run_id: self.run_id.to_string(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            total_papers: stats.total_papers,
            successful_extractions: stats.successful,
            failed_extractions: stats.failed,
            skipped_extractions: stats.skipped,
            aborted_for_balance: stats.aborted_for_balance,
            success_rate: stats.success_rate,
            logs: self.logs.clone(),
        }
    }

    /// Write the log file and return its path
    ///
    /// A second run within the same second gets a numbered suffix instead of
    /// overwriting the earlier file.
    pub fn save(&self) -> Result<PathBuf, ExtractorError> {
        std::fs::create_dir_all(&self.log_dir).map_err(|e| ExtractorError::file(&self.log_dir, e))?;

        let mut path = self.log_dir.join(format!("{}.json", self.file_stem));
        let mut n = 1;
        while path.exists() {
            n += 1;
            path = self.log_dir.join(format!("{}_{}.json", self.file_stem, n));
        }

        let json = serde_json::to_string_pretty(&self.to_summary())?;
        std::fs::write(&path, json).map_err(|e| ExtractorError::file(&path, e))?;
        info!("Run log saved to {}", path.display());
        Ok(path)
    }
}

/// Count entities and relations in an extracted graph
///
/// Lists count by length; maps (grouped by type) by the summed lengths of
/// their list values, other values counting 1 each. Anything else counts 0.
///
/// # Examples
///
/// ```
/// use paperkg_extractor::run_log::count_graph_elements;
/// use serde_json::json;
///
/// let graph = json!({
///     "entities": {"Component": [1, 2], "Fault": [3], "note": "x"},
///     "relations": [{"from": 1, "to": 3}]
/// });
/// assert_eq!(count_graph_elements(&graph), (4, 1));
/// ```
pub fn count_graph_elements(graph: &Value) -> (usize, usize) {
    (count_field(graph, "entities"), count_field(graph, "relations"))
}

fn count_field(graph: &Value, field: &str) -> usize {
    match graph.get(field) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(groups)) => groups
            .values()
            .map(|v| match v {
                Value::Array(items) => items.len(),
                _ => 1,
            })
            .sum(),
        _ => 0,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
