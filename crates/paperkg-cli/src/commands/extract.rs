//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::{Config, OutputFormat};
use crate::error::Result;
use crate::output::Formatter;
use paperkg_extractor::schema::{load_schema_text, parse_field_list};
use paperkg_extractor::{ContinuationPolicy, Corpus, Orchestrator, OutputLayout, PromptResolver};
use paperkg_llm::vendor::{mask_key, normalize_base_url};
use paperkg_llm::{LlmError, ModelClient, OpenAiCompatProvider, RetryPolicy};
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::{info, warn};

/// Execute the extract command.
pub async fn execute_extract(args: ExtractArgs, config: &mut Config, formatter: &Formatter) -> Result<()> {
    apply_overrides(&args, config);
    config.validate()?;

    let vendor = args.vendor;
    let (api_key, key_source) = vendor.resolve_api_key(|name| std::env::var(name).ok())?;
    let base_url = match &args.base_url {
        Some(url) => normalize_base_url(url),
        None => vendor.default_base_url().to_string(),
    };
    vendor.check_key(&base_url, &api_key, key_source)?;

    let mut provider = OpenAiCompatProvider::for_vendor(vendor, api_key.as_str())?.with_endpoint(base_url.as_str());
    if let Some(model) = &args.model {
        provider = provider.with_model(model.as_str());
    }
    info!(
        vendor = vendor.as_str(),
        base_url = %base_url,
        key = %mask_key(&api_key),
        key_source,
        "Provider configured"
    );

    if args.skip_preflight {
        info!("Preflight check skipped");
    } else {
        match provider.preflight().await {
            Ok(models) => info!(models, "Preflight check passed"),
            Err(e @ LlmError::Unauthorized(_)) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Preflight check failed, continuing");
                eprintln!("{}", formatter.warning(&format!("Preflight check failed: {}", e)));
            }
        }
    }

    let corpus = Corpus::discover(&config.paths.papers_dir)?;
    let mut resolver = PromptResolver::new(&config.paths.prompt_dir);
    if let Some(file) = &args.prompt_file {
        resolver = resolver.with_override(file, &config.paths.prompt_dir)?;
    }
    if !resolver.has_fallback() {
        eprintln!(
            "{}",
            formatter.warning("No default prompt template; papers without their own template will be skipped")
        );
    }
    let schema = load_schema_text(&config.paths.schema_file, &config.extraction.schema_fields);

    let client = ModelClient::new(
        provider,
        RetryPolicy::new(config.extraction.max_retries),
        vendor.request_options(),
    );
    let layout = OutputLayout::new(config.vendor_output_dir(vendor), config.vendor_log_dir(vendor));
    let orchestrator = Orchestrator::new(client, resolver, config.extraction.clone(), layout)?
        .with_schema(schema)
        .with_hint(vendor.json_hint().map(str::to_string));

    let mut continuation = continuation_policy(args.auto_continue.as_deref(), formatter);
    let report = orchestrator.run(&corpus, &mut continuation).await?;

    println!("{}", formatter.format_report(&report)?);
    Ok(())
}

fn apply_overrides(args: &ExtractArgs, config: &mut Config) {
    config.apply_dirs(&args.dirs);
    config.apply_batch(&args.batch);

    let extraction = &mut config.extraction;
    if let Some(n) = args.max_retries {
        extraction.max_retries = n;
    }
    if let Some(secs) = args.sleep_secs {
        extraction.sleep_secs = secs;
    }
    if let Some(raw) = &args.schema_fields {
        let fields = parse_field_list(raw);
        if !fields.is_empty() {
            extraction.schema_fields = fields;
        }
    }
    if let Some(hint) = &args.json_hint {
        extraction.json_hint = Some(hint.clone());
    }
}

/// Interpret `AUTO_CONTINUE_REST`: `Some(true)` for y/yes, `Some(false)` for n/no.
pub fn parse_auto_continue(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Build the continuation policy: fixed answer, terminal prompt, or stop.
fn continuation_policy(auto: Option<&str>, formatter: &Formatter) -> ContinuationPolicy {
    match auto.and_then(parse_auto_continue) {
        Some(true) => ContinuationPolicy::AlwaysContinue,
        Some(false) => ContinuationPolicy::NeverContinue,
        None if io::stdin().is_terminal() => {
            let formatter = prompt_formatter(formatter);
            ContinuationPolicy::ask(move |checkpoint| {
                print!("{}", formatter.checkpoint_prompt(checkpoint));
                if io::stdout().flush().is_err() {
                    return false;
                }
                let mut answer = String::new();
                match io::stdin().lock().read_line(&mut answer) {
                    Ok(_) => parse_auto_continue(&answer).unwrap_or(false),
                    Err(_) => false,
                }
            })
        }
        None => {
            info!("No terminal attached and AUTO_CONTINUE_REST unset; stopping after the trial batch");
            ContinuationPolicy::NeverContinue
        }
    }
}

/// Table-style formatter for the checkpoint question, keeping the resolved color choice.
fn prompt_formatter(formatter: &Formatter) -> Formatter {
    Formatter::new(OutputFormat::Table, formatter.color_enabled())
}
