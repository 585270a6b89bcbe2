//! End-to-end runs over a temporary corpus with a scripted provider

use paperkg_domain::{ChatOutcome, ProviderFailure};
use paperkg_extractor::{
    ContinuationPolicy, Corpus, EntryStatus, ExtractorConfig, Orchestrator, OutputLayout,
    PromptResolver, RunReport, RunSummary, StopReason,
};
use paperkg_llm::retry::no_backoff;
use paperkg_llm::{MockProvider, ModelClient, RequestOptions, RetryPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const GRAPH: &str = r#"{"entities": [{"id": "e1"}, {"id": "e2"}], "relations": [{"from": "e1", "to": "e2"}]}"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        fs::write(prompts.join("prompt.txt"), "Extract a graph.\n\n{full_text_placeholder}").unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn add_paper(&self, category: &str, name: &str, text: &str) {
        let dir = self.root().join("papers").join(category);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), text).unwrap();
    }

    fn out(&self, relative: &str) -> PathBuf {
        self.root().join("out").join(relative)
    }

    fn corpus(&self) -> Corpus {
        Corpus::discover(&self.root().join("papers")).unwrap()
    }

    fn orchestrator(&self, provider: MockProvider, config: ExtractorConfig) -> Orchestrator<MockProvider> {
        let client = ModelClient::new(
            provider,
            RetryPolicy::new(config.max_retries).with_backoff(no_backoff),
            RequestOptions::default(),
        );
        Orchestrator::new(
            client,
            PromptResolver::new(self.root().join("prompts")),
            config,
            OutputLayout::new(self.root().join("out"), self.root().join("logs")),
        )
        .unwrap()
    }

    async fn run(&self, provider: MockProvider, config: ExtractorConfig, policy: ContinuationPolicy) -> RunReport {
        let mut policy = policy;
        self.orchestrator(provider, config)
            .run(&self.corpus(), &mut policy)
            .await
            .unwrap()
    }
}

fn fast_config() -> ExtractorConfig {
    ExtractorConfig {
        sleep_secs: 0.0,
        ..ExtractorConfig::default()
    }
}

fn read_log(path: &Path) -> RunSummary {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_all_documents_succeed() {
    let ws = Workspace::new();
    ws.add_paper("priority", "a.md", "paper a");
    ws.add_paper("priority", "b.md", "paper b");
    ws.add_paper("general", "c.md", "paper c");

    let provider = MockProvider::new(GRAPH);
    let report = ws
        .run(provider.clone(), fast_config(), ContinuationPolicy::AlwaysContinue)
        .await;

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.stats.total_papers, 3);
    assert_eq!(report.stats.successful, 3);
    assert_eq!(report.stats.success_rate, 100.0);
    assert_eq!(report.batches_run, 2);
    assert_eq!(provider.call_count(), 3);

    let expected: serde_json::Value = serde_json::from_str(GRAPH).unwrap();
    for relative in ["priority/a.json", "priority/b.json", "general/c.json"] {
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(ws.out(relative)).unwrap()).unwrap();
        assert_eq!(written, expected, "{}", relative);
        assert!(!ws.out(&format!("{}.tmp", relative)).exists());
    }

    let log = read_log(&report.log_path);
    assert_eq!(log.logs.len(), 3);
    assert_eq!(log.logs[0].paper, "priority/a.md");
    assert_eq!(log.logs[2].paper, "general/c.md");
    assert!(log.logs.iter().all(|e| e.entity_count == 2 && e.relation_count == 1));
}

#[tokio::test]
async fn test_refusal_is_recorded_and_run_continues() {
    let ws = Workspace::new();
    ws.add_paper("priority", "a.md", "paper a");
    ws.add_paper("priority", "b.md", "paper b");
    ws.add_paper("priority", "c.md", "paper c");

    let mut provider = MockProvider::new(GRAPH);
    provider.add_response("paper b", "I cannot comply");
    let report = ws
        .run(provider.clone(), fast_config(), ContinuationPolicy::AlwaysContinue)
        .await;

    assert_eq!(report.stats.successful, 2);
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.stats.success_rate, 66.67);
    // b is attempted max_retries times
    assert_eq!(provider.call_count(), 2 + 3);

    assert!(!ws.out("priority/b.json").exists());
    assert!(ws.out("priority/b.failed.txt").exists());
    assert_eq!(
        fs::read_to_string(ws.out("priority/b.raw.txt")).unwrap(),
        "I cannot comply"
    );
    assert!(ws.out("priority/c.json").exists());

    let log = read_log(&report.log_path);
    let failed = &log.logs[1];
    assert_eq!(failed.status, EntryStatus::Failed);
    assert_eq!(failed.attempts, Some(3));
}

#[tokio::test]
async fn test_rerun_skips_existing_outputs() {
    let ws = Workspace::new();
    ws.add_paper("priority", "a.md", "paper a");
    ws.add_paper("general", "b.md", "paper b");

    let first = MockProvider::new(GRAPH);
    ws.run(first.clone(), fast_config(), ContinuationPolicy::AlwaysContinue)
        .await;
    assert_eq!(first.call_count(), 2);
    let before = fs::read_to_string(ws.out("priority/a.json")).unwrap();

    let second = MockProvider::new(r#"{"entities": [], "relations": []}"#);
    let report = ws
        .run(second.clone(), fast_config(), ContinuationPolicy::AlwaysContinue)
        .await;

    assert_eq!(second.call_count(), 0);
    assert_eq!(report.stats.successful, 2);
    assert_eq!(report.stats.skipped, 2);
    assert_eq!(report.documents_sent, 0);
    assert_eq!(fs::read_to_string(ws.out("priority/a.json")).unwrap(), before);
}

#[tokio::test]
async fn test_exhausted_balance_stops_run() {
    let ws = Workspace::new();
    for name in ["a.md", "b.md", "c.md"] {
        ws.add_paper("priority", name, &format!("paper {}", name));
    }

    let provider = MockProvider::new(GRAPH);
    provider.push_outcome(ChatOutcome::Reply(paperkg_domain::ChatReply::text(GRAPH)));
    provider.push_outcome(ChatOutcome::Error(ProviderFailure::http(
        402,
        r#"{"error": {"message": "Insufficient Balance"}}"#,
    )));
    let report = ws
        .run(provider.clone(), fast_config(), ContinuationPolicy::AlwaysContinue)
        .await;

    assert!(report.aborted_for_balance());
    assert!(matches!(report.stop_reason, StopReason::QuotaExhausted(_)));
    assert_eq!(provider.call_count(), 2);
    assert_eq!(report.stats.successful, 1);
    assert_eq!(report.stats.failed, 1);

    assert!(ws.out("priority/a.json").exists());
    assert!(!ws.out("priority/b.failed.txt").exists());
    assert!(!ws.out("priority/c.json").exists());

    let log = read_log(&report.log_path);
    assert!(log.aborted_for_balance);
    assert_eq!(log.logs.len(), 2);
    assert_eq!(log.logs[1].status, EntryStatus::AbortedBalance);
}

#[tokio::test]
async fn test_declined_continuation_runs_only_trial_batch() {
    let ws = Workspace::new();
    for i in 0..4 {
        ws.add_paper("priority", &format!("p{}.md", i), &format!("paper {}", i));
    }
    ws.add_paper("general", "g.md", "general paper");

    let asked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&asked);
    let policy = ContinuationPolicy::ask(move |checkpoint| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(checkpoint.completed_batch, 1);
        assert_eq!(checkpoint.remaining_documents, 3);
        assert_eq!(checkpoint.stats.successful, 2);
        false
    });

    let config = ExtractorConfig {
        first_batch_size: 2,
        in_scope_limit: 3,
        ..fast_config()
    };
    let provider = MockProvider::new(GRAPH);
    let report = ws.run(provider.clone(), config, policy).await;

    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(report.stop_reason, StopReason::DeclinedContinuation);
    assert_eq!(report.batches_run, 1);
    assert_eq!(provider.call_count(), 2);
    assert!(report.log_path.exists());
}

#[tokio::test]
async fn test_single_batch_never_asks() {
    let ws = Workspace::new();
    ws.add_paper("priority", "a.md", "paper a");

    let report = ws
        .run(MockProvider::new(GRAPH), fast_config(), ContinuationPolicy::NeverContinue)
        .await;
    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.stats.successful, 1);
}

#[tokio::test]
async fn test_only_priority_drops_general() {
    let ws = Workspace::new();
    ws.add_paper("priority", "a.md", "paper a");
    ws.add_paper("general", "b.md", "paper b");

    let config = ExtractorConfig {
        only_priority: true,
        ..fast_config()
    };
    let provider = MockProvider::new(GRAPH);
    let report = ws
        .run(provider.clone(), config, ContinuationPolicy::AlwaysContinue)
        .await;

    assert_eq!(report.stats.total_papers, 1);
    assert_eq!(provider.call_count(), 1);
    assert!(!ws.out("general/b.json").exists());
}

#[tokio::test]
async fn test_per_document_prompt_for_priority() {
    let ws = Workspace::new();
    fs::write(
        ws.root().join("prompts/prompt_a.txt"),
        "SPECIAL {full_text_placeholder}",
    )
    .unwrap();
    ws.add_paper("priority", "a.md", "paper a");
    ws.add_paper("general", "a2.md", "paper a2");

    let provider = MockProvider::new(GRAPH);
    let report = ws
        .run(provider.clone(), fast_config(), ContinuationPolicy::AlwaysContinue)
        .await;

    let requests = provider.requests();
    assert_eq!(requests[0].prompt, "SPECIAL paper a");
    assert!(requests[1].prompt.starts_with("Extract a graph."));

    let log = read_log(&report.log_path);
    assert_eq!(log.logs[0].prompt_source.as_deref(), Some("per_document:prompt_a.txt"));
    assert_eq!(log.logs[1].prompt_source.as_deref(), Some("default:prompt.txt"));
}

#[tokio::test(start_paused = true)]
async fn test_sleep_only_after_model_calls() {
    let ws = Workspace::new();
    ws.add_paper("priority", "a.md", "paper a");
    ws.add_paper("priority", "b.md", "paper b");
    ws.add_paper("priority", "c.md", "paper c");
    fs::create_dir_all(ws.out("priority")).unwrap();
    fs::write(ws.out("priority/b.json"), "{}").unwrap();

    let config = ExtractorConfig {
        sleep_secs: 5.0,
        ..ExtractorConfig::default()
    };
    let start = tokio::time::Instant::now();
    let report = ws
        .run(MockProvider::new(GRAPH), config, ContinuationPolicy::AlwaysContinue)
        .await;
    let elapsed = start.elapsed();

    assert_eq!(report.documents_sent, 2);
    assert!(elapsed >= Duration::from_secs(10), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(15), "elapsed {:?}", elapsed);
}
