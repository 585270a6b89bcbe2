//! Plan command implementation.

use crate::cli::PlanArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use paperkg_extractor::{BatchPlan, Corpus, OutputLayout};

/// Execute the plan command.
pub fn execute_plan(args: PlanArgs, config: &mut Config, formatter: &Formatter) -> Result<()> {
    config.apply_dirs(&args.dirs);
    config.apply_batch(&args.batch);
    config.validate()?;

    let extraction = &config.extraction;
    let mut corpus = Corpus::discover(&config.paths.papers_dir)?;
    if extraction.only_priority {
        corpus = corpus.only_priority();
    }
    let plan = BatchPlan::new(&corpus, extraction.first_batch_size, extraction.in_scope_limit);

    let layout = args
        .vendor
        .map(|vendor| OutputLayout::new(config.vendor_output_dir(vendor), config.vendor_log_dir(vendor)));
    let output = formatter.format_plan(&plan, |doc| {
        layout
            .as_ref()
            .is_some_and(|layout| layout.output_path(doc).exists())
    })?;

    println!("{}", output);
    Ok(())
}
