//! Batch orchestration
//!
//! Runs a [`BatchPlan`] document by document through a [`ModelClient`],
//! writing one output file per document and one log entry per document.
//! Documents are processed strictly in order; the only early exit is an
//! exhausted account balance or a declined continuation.

use crate::config::ExtractorConfig;
use crate::corpus::Corpus;
use crate::error::ExtractorError;
use crate::plan::BatchPlan;
use crate::prompt::PromptResolver;
use crate::repair::parse_model_json;
use crate::run_log::{ExtractionLogger, LogEntry, RunStats};
use crate::types::{ExtractionResult, ExtractionTask, SkipReason};
use chrono::Utc;
use paperkg_domain::traits::ChatProvider;
use paperkg_domain::{Category, DocumentSource, RunId, TokenUsage};
use paperkg_llm::{CallOutcome, ModelClient};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where outputs and logs are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Root of the per-category output directories
    pub output_dir: PathBuf,

    /// Directory for run logs
    pub log_dir: PathBuf,
}

impl OutputLayout {
    /// Create a layout
    pub fn new(output_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            log_dir: log_dir.into(),
        }
    }

    /// `<output_dir>/<category>`
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.output_dir.join(category.as_str())
    }

    /// `<output_dir>/<category>/<id>.json`
    pub fn output_path(&self, document: &DocumentSource) -> PathBuf {
        self.category_dir(document.category)
            .join(format!("{}.json", document.id))
    }
}

/// State passed to the continuation decision after the first batch
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Index of the batch just finished
    pub completed_batch: usize,

    /// Batches still to run
    pub remaining_batches: usize,

    /// Documents in the remaining batches
    pub remaining_documents: usize,

    /// Counters so far
    pub stats: RunStats,
}

/// Callback deciding whether to continue past the first batch
pub type ContinuationCallback = Box<dyn FnMut(&Checkpoint) -> bool + Send>;

/// Decision made after the first batch when more batches remain
pub enum ContinuationPolicy {
    /// Run every batch
    AlwaysContinue,

    /// Stop after the first batch
    NeverContinue,

    /// Let the caller decide
    AskCaller(ContinuationCallback),
}

impl ContinuationPolicy {
    /// Wrap a callback
    pub fn ask<F>(callback: F) -> Self
    where
        F: FnMut(&Checkpoint) -> bool + Send + 'static,
    {
        ContinuationPolicy::AskCaller(Box::new(callback))
    }

    /// Decide for `checkpoint`
    pub fn should_continue(&mut self, checkpoint: &Checkpoint) -> bool {
        match self {
            ContinuationPolicy::AlwaysContinue => true,
            ContinuationPolicy::NeverContinue => false,
            ContinuationPolicy::AskCaller(callback) => callback(checkpoint),
        }
    }
}

impl fmt::Debug for ContinuationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContinuationPolicy::AlwaysContinue => f.write_str("AlwaysContinue"),
            ContinuationPolicy::NeverContinue => f.write_str("NeverContinue"),
            ContinuationPolicy::AskCaller(_) => f.write_str("AskCaller(..)"),
        }
    }
}

/// Mutable state of one run
#[derive(Debug)]
pub struct RunContext {
    /// Log collecting one entry per document
    pub logger: ExtractionLogger,

    /// Token usage summed over successful documents
    pub usage: TokenUsage,

    /// Documents that reached the model
    pub documents_sent: usize,

    /// Set when the balance ran out
    pub abort: Option<String>,
}

impl RunContext {
    /// Fresh context around `logger`
    pub fn new(logger: ExtractionLogger) -> Self {
        Self {
            logger,
            usage: TokenUsage::default(),
            documents_sent: 0,
            abort: None,
        }
    }

    fn record(&mut self, result: &ExtractionResult) {
        if result.reached_model() {
            self.documents_sent += 1;
        }
        match result {
            ExtractionResult::Success { usage: Some(usage), .. } => self.usage.accumulate(usage),
            ExtractionResult::AbortedBalance { error, .. } => self.abort = Some(error.clone()),
            _ => {}
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every planned batch ran
    Completed,

    /// The vendor reported an exhausted balance
    QuotaExhausted(String),

    /// The continuation policy stopped the run after the first batch
    DeclinedContinuation,
}

/// Result of [`Orchestrator::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Run identity
    pub run_id: RunId,

    /// Final counters
    pub stats: RunStats,

    /// Batches started
    pub batches_run: usize,

    /// Why the run ended
    pub stop_reason: StopReason,

    /// Saved run log
    pub log_path: PathBuf,

    /// Token usage summed over successful documents
    pub usage: TokenUsage,

    /// Documents that reached the model
    pub documents_sent: usize,
}

impl RunReport {
    /// Whether the run ended on an exhausted balance
    pub fn aborted_for_balance(&self) -> bool {
        matches!(self.stop_reason, StopReason::QuotaExhausted(_))
    }
}

/// Drives extraction over a corpus
#[derive(Debug)]
pub struct Orchestrator<P> {
    client: ModelClient<P>,
    resolver: PromptResolver,
    config: ExtractorConfig,
    layout: OutputLayout,
    schema: Option<String>,
    hint: Option<String>,
}

impl<P: ChatProvider> Orchestrator<P> {
    /// Create an orchestrator
    ///
    /// # Errors
    ///
    /// [`ExtractorError::Config`] if `config` fails validation.
    pub fn new(
        client: ModelClient<P>,
        resolver: PromptResolver,
        config: ExtractorConfig,
        layout: OutputLayout,
    ) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        let hint = config.json_hint.clone();
        Ok(Self {
            client,
            resolver,
            config,
            layout,
            schema: None,
            hint,
        })
    }

    /// Schema text substituted into prompts
    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }

    /// Output hint appended to prompts; a configured hint takes precedence
    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        if self.config.json_hint.is_none() {
            self.hint = hint;
        }
        self
    }

    /// Model client in use
    pub fn client(&self) -> &ModelClient<P> {
        &self.client
    }

    /// Output layout in use
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Batches this orchestrator would run for `corpus`
    pub fn plan(&self, corpus: &Corpus) -> BatchPlan {
        if self.config.only_priority {
            let priority = corpus.clone().only_priority();
            BatchPlan::new(&priority, self.config.first_batch_size, self.config.in_scope_limit)
        } else {
            BatchPlan::new(corpus, self.config.first_batch_size, self.config.in_scope_limit)
        }
    }

    /// Run every batch, then save the run log
    ///
    /// # Errors
    ///
    /// Only a failure to write the run log is returned; per-document
    /// failures are recorded in the log.
    pub async fn run(
        &self,
        corpus: &Corpus,
        continuation: &mut ContinuationPolicy,
    ) -> Result<RunReport, ExtractorError> {
        let plan = self.plan(corpus);
        let provider = self.client.provider();
        let logger = ExtractionLogger::new(
            &self.layout.log_dir,
            RunId::new(),
            provider.name(),
            provider.model(),
        );
        let mut ctx = RunContext::new(logger);
        ctx.logger.set_total(plan.document_count());

        info!(
            run_id = %ctx.logger.run_id(),
            provider = provider.name(),
            model = provider.model(),
            batches = plan.batches().len(),
            documents = plan.document_count(),
            "Starting extraction run"
        );

        let sleep = self.config.sleep();
        let batches = plan.batches();
        let mut batches_run = 0;
        let mut stop_reason = StopReason::Completed;

        'batches: for (position, batch) in batches.iter().enumerate() {
            if position == 1 {
                let rest = &batches[position..];
                let checkpoint = Checkpoint {
                    completed_batch: batches[0].index,
                    remaining_batches: rest.len(),
                    remaining_documents: rest.iter().map(|b| b.documents.len()).sum(),
                    stats: ctx.logger.summary(),
                };
                if !continuation.should_continue(&checkpoint) {
                    info!(
                        remaining_batches = checkpoint.remaining_batches,
                        "Stopping after first batch"
                    );
                    stop_reason = StopReason::DeclinedContinuation;
                    break;
                }
            }

            batches_run += 1;
            info!(
                batch = batch.index,
                kind = %batch.kind,
                documents = batch.documents.len(),
                "Starting batch"
            );

            for source in &batch.documents {
                let mut task = ExtractionTask::new(
                    source.clone(),
                    &self.layout.category_dir(source.category),
                    batch.index,
                );
                let result = self.extract_document(&mut ctx, &mut task).await;

                if result.is_fatal() {
                    warn!(batch = batch.index, "Balance exhausted, skipping remaining documents");
                    break 'batches;
                }
                if result.reached_model() && !sleep.is_zero() {
                    tokio::time::sleep(sleep).await;
                }
            }
        }

        if let Some(error) = ctx.abort.take() {
            stop_reason = StopReason::QuotaExhausted(error);
        }

        let log_path = ctx.logger.save()?;
        let stats = ctx.logger.summary();
        info!(
            successful = stats.successful,
            failed = stats.failed,
            skipped = stats.skipped,
            success_rate = stats.success_rate,
            "Extraction run finished"
        );

        Ok(RunReport {
            run_id: ctx.logger.run_id(),
            stats,
            batches_run,
            stop_reason,
            log_path,
            usage: ctx.usage,
            documents_sent: ctx.documents_sent,
        })
    }

    /// Process one document and record exactly one log entry for it
    pub async fn extract_document(
        &self,
        ctx: &mut RunContext,
        task: &mut ExtractionTask,
    ) -> ExtractionResult {
        let result = self.process(ctx, task).await;
        ctx.record(&result);
        result
    }

    async fn process(&self, ctx: &mut RunContext, task: &mut ExtractionTask) -> ExtractionResult {
        let paper = task.document.relative_path();

        if task.output_path.exists() {
            info!(paper = %paper, "Output exists, skipping");
            ctx.logger.add_entry(LogEntry::skipped(
                &paper,
                SkipReason::OutputExists,
                Some(&task.output_path),
            ));
            return ExtractionResult::Skipped {
                reason: SkipReason::OutputExists,
            };
        }

        let start = Instant::now();
        let text = match std::fs::read_to_string(task.document.path()) {
            Ok(text) => text,
            Err(e) => {
                let error = ExtractorError::file(task.document.path(), e).to_string();
                return self.fail(ctx, task, start, error, 0, None);
            }
        };
        let document = task.document.with_text(text);

        let resolved = match self.resolver.resolve(&document) {
            Ok(resolved) => resolved,
            Err(ExtractorError::PromptNotFound { .. }) => {
                warn!(paper = %paper, "No prompt template found, skipping");
                ctx.logger.add_entry(LogEntry::skipped(&paper, SkipReason::NoPrompt, None));
                return ExtractionResult::Skipped {
                    reason: SkipReason::NoPrompt,
                };
            }
            Err(e) => return self.fail(ctx, task, start, e.to_string(), 0, None),
        };
        debug!(paper = %paper, source = %resolved.source, "Prompt resolved");
        let prompt = resolved.fill(&document, self.schema.as_deref(), self.hint.as_deref());
        task.prompt_source = Some(resolved.source);

        info!(
            paper = %paper,
            batch = task.batch_index,
            chars = document.text.len(),
            "Extracting"
        );

        match self
            .client
            .call_with(&prompt, |reply| parse_model_json(&reply.content))
            .await
        {
            CallOutcome::Completed(completion) => {
                if let Err(e) = write_json(&task.output_path, &completion.value) {
                    return self.fail(ctx, task, start, e.to_string(), completion.attempts, None);
                }
                let duration = start.elapsed();
                info!(
                    paper = %paper,
                    attempts = completion.attempts,
                    duration_secs = duration.as_secs_f64(),
                    "Extraction succeeded"
                );

                let mut entry = LogEntry::success(&paper, duration, &completion.value, completion.usage)
                    .with_attempts(completion.attempts)
                    .with_output(&task.output_path)
                    .with_generation(completion.finish_reason, completion.max_tokens);
                if let Some(source) = &task.prompt_source {
                    entry = entry.with_prompt_source(source.to_string());
                }
                ctx.logger.add_entry(entry);

                ExtractionResult::Success {
                    parsed: completion.value,
                    usage: completion.usage,
                    duration,
                    attempts: completion.attempts,
                }
            }
            CallOutcome::Failed {
                error,
                attempts,
                last_raw,
            } => self.fail(ctx, task, start, error, attempts, last_raw),
            CallOutcome::QuotaExhausted { error, attempts } => {
                let duration = start.elapsed();
                warn!(paper = %paper, error = %error, "Account balance exhausted");
                let mut entry =
                    LogEntry::aborted_balance(&paper, duration, &error).with_attempts(attempts);
                if let Some(source) = &task.prompt_source {
                    entry = entry.with_prompt_source(source.to_string());
                }
                ctx.logger.add_entry(entry);

                ExtractionResult::AbortedBalance {
                    error,
                    attempts,
                    duration,
                }
            }
        }
    }

    /// Write the failure marker and raw output, then log the failure
    fn fail(
        &self,
        ctx: &mut RunContext,
        task: &ExtractionTask,
        start: Instant,
        error: String,
        attempts: u32,
        raw: Option<String>,
    ) -> ExtractionResult {
        let paper = task.document.relative_path();
        let duration = start.elapsed();
        warn!(paper = %paper, attempts, error = %error, "Extraction failed");

        let mut entry = LogEntry::failed(&paper, duration, &error).with_attempts(attempts);
        if let Some(source) = &task.prompt_source {
            entry = entry.with_prompt_source(source.to_string());
        }

        if let Some(raw) = raw {
            let path = task.raw_output_path();
            match write_text(&path, &raw) {
                Ok(()) => entry = entry.with_raw_output(&path),
                Err(e) => warn!(error = %e, "Could not save raw output"),
            }
        }

        let marker = task.failure_marker_path();
        let body = format!("failed_at: {}\nerror: {}\n", Utc::now().to_rfc3339(), error);
        match write_text(&marker, &body) {
            Ok(()) => entry = entry.with_fail_flag(&marker),
            Err(e) => warn!(error = %e, "Could not write failure marker"),
        }

        ctx.logger.add_entry(entry);
        ExtractionResult::Failure {
            error,
            attempts,
            duration,
        }
    }
}

/// Write through a sibling `.tmp` file so `path` is either absent or complete
fn write_text(path: &Path, contents: &str) -> Result<(), ExtractorError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExtractorError::file(parent, e))?;
    }
    let tmp = temp_sibling(path);
    std::fs::write(&tmp, contents).map_err(|e| ExtractorError::file(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ExtractorError::file(path, e)
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), ExtractorError> {
    let json = serde_json::to_string_pretty(value)?;
    write_text(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperkg_domain::{ChatOutcome, ProviderFailure};
    use paperkg_llm::retry::no_backoff;
    use paperkg_llm::{MockProvider, RequestOptions, RetryPolicy};
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("prompts")).unwrap();
            fs::write(
                dir.path().join("prompts/prompt.txt"),
                "Extract: {full_text_placeholder}",
            )
            .unwrap();
            Self { dir }
        }

        fn paper(&self, category: Category, name: &str, text: &str) -> DocumentSource {
            let path = self.dir.path().join("papers").join(category.as_str()).join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, text).unwrap();
            DocumentSource::from_path(path, category).unwrap()
        }

        fn layout(&self) -> OutputLayout {
            OutputLayout::new(self.dir.path().join("out"), self.dir.path().join("logs"))
        }

        fn orchestrator(&self, provider: MockProvider) -> Orchestrator<MockProvider> {
            let client = ModelClient::new(
                provider,
                RetryPolicy::new(2).with_backoff(no_backoff),
                RequestOptions::default(),
            );
            let config = ExtractorConfig {
                sleep_secs: 0.0,
                ..ExtractorConfig::default()
            };
            Orchestrator::new(
                client,
                PromptResolver::new(self.dir.path().join("prompts")),
                config,
                self.layout(),
            )
            .unwrap()
        }

        fn context(&self) -> RunContext {
            RunContext::new(ExtractionLogger::new(
                self.dir.path().join("logs"),
                RunId::new(),
                "mock",
                "mock-model",
            ))
        }

        fn task(&self, source: DocumentSource) -> ExtractionTask {
            let dir = self.layout().category_dir(source.category);
            ExtractionTask::new(source, &dir, 1)
        }
    }

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("out", "logs");
        let source = DocumentSource::from_path("papers/general/x.md", Category::General).unwrap();
        assert_eq!(layout.output_path(&source), Path::new("out/general/x.json"));
    }

    #[test]
    fn test_write_json_replaces_through_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/priority/a.json");
        assert_eq!(temp_sibling(&path), dir.path().join("out/priority/a.json.tmp"));

        write_json(&path, &serde_json::json!({"entities": []})).unwrap();
        write_json(&path, &serde_json::json!({"entities": [{"name": "x"}]})).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["entities"][0]["name"], "x");
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.json")]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let client = ModelClient::new(
            MockProvider::default(),
            RetryPolicy::default(),
            RequestOptions::default(),
        );
        let config = ExtractorConfig {
            first_batch_size: 5,
            in_scope_limit: 2,
            ..ExtractorConfig::default()
        };
        let result = Orchestrator::new(
            client,
            PromptResolver::new("prompts"),
            config,
            OutputLayout::new("out", "logs"),
        );
        assert!(matches!(result, Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_continuation_callback_sees_checkpoint() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut policy = ContinuationPolicy::ask(move |cp| {
            *sink.lock().unwrap() = Some(cp.remaining_documents);
            false
        });
        let checkpoint = Checkpoint {
            completed_batch: 1,
            remaining_batches: 2,
            remaining_documents: 7,
            stats: RunStats::default(),
        };
        assert!(!policy.should_continue(&checkpoint));
        assert_eq!(*seen.lock().unwrap(), Some(7));
        assert!(ContinuationPolicy::AlwaysContinue.should_continue(&checkpoint));
        assert_eq!(format!("{:?}", policy), "AskCaller(..)");
    }

    #[tokio::test]
    async fn test_success_writes_output_and_entry() {
        let fx = Fixture::new();
        let source = fx.paper(Category::Priority, "a.md", "paper a");
        let orch = fx.orchestrator(MockProvider::new(
            "```json\n{\"entities\": [1, 2], \"relations\": [3]}\n```",
        ));
        let mut ctx = fx.context();
        let mut task = fx.task(source);

        let result = orch.extract_document(&mut ctx, &mut task).await;
        assert!(matches!(result, ExtractionResult::Success { attempts: 1, .. }));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&task.output_path).unwrap()).unwrap();
        assert_eq!(written["relations"], serde_json::json!([3]));

        let entry = &ctx.logger.entries()[0];
        assert_eq!(entry.paper, "priority/a.md");
        assert_eq!(entry.entity_count, 2);
        assert_eq!(entry.relation_count, 1);
        assert_eq!(entry.prompt_source.as_deref(), Some("default:prompt.txt"));
        assert_eq!(ctx.documents_sent, 1);
    }

    #[tokio::test]
    async fn test_existing_output_skips_model() {
        let fx = Fixture::new();
        let source = fx.paper(Category::General, "b.md", "paper b");
        let provider = MockProvider::new("{}");
        let orch = fx.orchestrator(provider.clone());
        let mut ctx = fx.context();
        let mut task = fx.task(source);
        fs::create_dir_all(task.output_path.parent().unwrap()).unwrap();
        fs::write(&task.output_path, "{}").unwrap();

        let result = orch.extract_document(&mut ctx, &mut task).await;
        assert_eq!(result, ExtractionResult::Skipped { reason: SkipReason::OutputExists });
        assert_eq!(provider.call_count(), 0);

        let stats = ctx.logger.summary();
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(ctx.logger.entries()[0].duration_seconds, 0.0);
    }

    #[tokio::test]
    async fn test_missing_prompt_is_skipped() {
        let fx = Fixture::new();
        fs::remove_file(fx.dir.path().join("prompts/prompt.txt")).unwrap();
        let source = fx.paper(Category::General, "c.md", "paper c");
        let provider = MockProvider::new("{}");
        let orch = fx.orchestrator(provider.clone());
        let mut ctx = fx.context();

        let result = orch.extract_document(&mut ctx, &mut fx.task(source)).await;
        assert_eq!(result, ExtractionResult::Skipped { reason: SkipReason::NoPrompt });
        assert_eq!(provider.call_count(), 0);

        let stats = ctx.logger.summary();
        assert_eq!((stats.successful, stats.failed, stats.skipped), (0, 0, 1));
    }

    #[tokio::test]
    async fn test_unparseable_output_writes_marker_and_raw() {
        let fx = Fixture::new();
        let source = fx.paper(Category::Priority, "d.md", "paper d");
        let orch = fx.orchestrator(MockProvider::new("I cannot comply"));
        let mut ctx = fx.context();
        let mut task = fx.task(source);

        let result = orch.extract_document(&mut ctx, &mut task).await;
        assert!(matches!(result, ExtractionResult::Failure { attempts: 2, .. }));
        assert!(!task.output_path.exists());

        let marker = fs::read_to_string(task.failure_marker_path()).unwrap();
        assert!(marker.starts_with("failed_at: "));
        assert!(marker.contains("error: "));
        assert_eq!(fs::read_to_string(task.raw_output_path()).unwrap(), "I cannot comply");

        let entry = &ctx.logger.entries()[0];
        assert!(!entry.success);
        assert!(entry.fail_flag.is_some());
        assert!(entry.raw_output.is_some());
    }

    #[tokio::test]
    async fn test_quota_exhausted_aborts_without_marker() {
        let fx = Fixture::new();
        let source = fx.paper(Category::Priority, "e.md", "paper e");
        let provider = MockProvider::new("{}");
        provider.push_outcome(ChatOutcome::Error(ProviderFailure::http(402, "Insufficient Balance")));
        let orch = fx.orchestrator(provider.clone());
        let mut ctx = fx.context();
        let mut task = fx.task(source);

        let result = orch.extract_document(&mut ctx, &mut task).await;
        assert!(result.is_fatal());
        assert_eq!(provider.call_count(), 1);
        assert!(!task.failure_marker_path().exists());
        assert!(ctx.abort.is_some());
        assert!(ctx.logger.summary().aborted_for_balance);
    }

    #[tokio::test]
    async fn test_unreadable_document_fails_without_model_call() {
        let fx = Fixture::new();
        let source = DocumentSource::from_path(fx.dir.path().join("papers/priority/gone.md"), Category::Priority)
            .unwrap();
        let provider = MockProvider::new("{}");
        let orch = fx.orchestrator(provider.clone());
        let mut ctx = fx.context();

        let result = orch.extract_document(&mut ctx, &mut fx.task(source)).await;
        assert!(matches!(result, ExtractionResult::Failure { attempts: 0, .. }));
        assert!(!result.reached_model());
        assert_eq!(provider.call_count(), 0);
        assert_eq!(ctx.documents_sent, 0);
    }
}
