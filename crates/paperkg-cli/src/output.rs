//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use paperkg_domain::DocumentSource;
use paperkg_extractor::{BatchPlan, Checkpoint, OutputStats, RunReport, StopReason};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Whether ANSI colors are applied.
    pub fn color_enabled(&self) -> bool {
        self.color_enabled
    }

    /// Format a batch plan.
    ///
    /// `done` reports whether a document already has output.
    pub fn format_plan(&self, plan: &BatchPlan, done: impl Fn(&DocumentSource) -> bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let batches: Vec<serde_json::Value> = plan
                    .batches()
                    .iter()
                    .map(|b| {
                        serde_json::json!({
                            "index": b.index,
                            "kind": b.kind.as_str(),
                            "documents": b.documents.iter().map(|d| d.relative_path()).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&batches)?)
            }
            OutputFormat::Table => {
                if plan.is_empty() {
                    return Ok(self.colorize("No papers found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Batch", "Kind", "Paper", "Done"]);
                for batch in plan.batches() {
                    for doc in &batch.documents {
                        let mark = if done(doc) { "yes" } else { "" };
                        builder.push_record([
                            batch.index.to_string().as_str(),
                            batch.kind.as_str(),
                            doc.relative_path().as_str(),
                            mark,
                        ]);
                    }
                }

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(format!(
                    "{}\n{}",
                    table,
                    self.info(&format!(
                        "{} paper(s) in {} batch(es)",
                        plan.document_count(),
                        plan.batches().len()
                    ))
                ))
            }
        }
    }

    /// Format the end-of-run summary.
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "run_id": report.run_id.to_string(),
                "stats": report.stats,
                "batches_run": report.batches_run,
                "documents_sent": report.documents_sent,
                "stop_reason": stop_reason_str(&report.stop_reason),
                "log_path": report.log_path,
                "tokens": {
                    "prompt": report.usage.prompt,
                    "completion": report.usage.completion,
                    "total": report.usage.total,
                },
            }))?),
            OutputFormat::Table => {
                let stats = &report.stats;
                let mut builder = Builder::default();
                builder.push_record(["Papers", "Successful", "Failed", "Skipped", "Success rate", "Tokens"]);
                builder.push_record([
                    stats.total_papers.to_string(),
                    stats.successful.to_string(),
                    stats.failed.to_string(),
                    stats.skipped.to_string(),
                    format!("{:.2}%", stats.success_rate),
                    report.usage.total.to_string(),
                ]);
                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));

                let status = match &report.stop_reason {
                    StopReason::Completed => self.success("Run completed"),
                    StopReason::QuotaExhausted(error) => {
                        self.error(&format!("Run terminated early: account balance exhausted ({})", error))
                    }
                    StopReason::DeclinedContinuation => {
                        self.warning("Run stopped after the trial batch")
                    }
                };
                Ok(format!(
                    "{}\n{}\n{}",
                    table,
                    status,
                    self.info(&format!("Log saved to {}", report.log_path.display()))
                ))
            }
        }
    }

    /// Format output statistics.
    pub fn format_stats(&self, stats: &OutputStats, verbose: bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let per_document = if verbose {
                    serde_json::to_value(&stats.documents)?
                } else {
                    serde_json::Value::Null
                };
                Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "documents": stats.documents.len(),
                    "malformed": stats.malformed,
                    "total_entities": stats.total_entities(),
                    "total_relations": stats.total_relations(),
                    "mean_entities": stats.mean_entities(),
                    "per_document": per_document,
                }))?)
            }
            OutputFormat::Table => {
                if stats.documents.is_empty() && stats.malformed.is_empty() {
                    return Ok(self.colorize("No outputs found.", "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Document", "Entities", "Relations"]);
                if verbose {
                    for doc in &stats.documents {
                        builder.push_record([
                            doc.path.display().to_string(),
                            doc.entities.to_string(),
                            doc.relations.to_string(),
                        ]);
                    }
                }
                builder.push_record([
                    format!("total ({} documents)", stats.documents.len()),
                    stats.total_entities().to_string(),
                    stats.total_relations().to_string(),
                ]);

                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));

                let mut out = table.to_string();
                for path in &stats.malformed {
                    out.push('\n');
                    out.push_str(&self.warning(&format!("Malformed output: {}", path.display())));
                }
                Ok(out)
            }
        }
    }

    /// Question shown at the continuation checkpoint.
    pub fn checkpoint_prompt(&self, checkpoint: &Checkpoint) -> String {
        let stats = &checkpoint.stats;
        format!(
            "{}\n{}",
            self.info(&format!(
                "Batch {} done: {} successful, {} failed, {} skipped",
                checkpoint.completed_batch, stats.successful, stats.failed, stats.skipped
            )),
            self.colorize(
                &format!(
                    "Continue with the remaining {} batch(es) ({} paper(s))? [y/N] ",
                    checkpoint.remaining_batches, checkpoint.remaining_documents
                ),
                "cyan"
            )
        )
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn stop_reason_str(reason: &StopReason) -> &'static str {
    match reason {
        StopReason::Completed => "completed",
        StopReason::QuotaExhausted(_) => "quota_exhausted",
        StopReason::DeclinedContinuation => "declined_continuation",
    }
}
