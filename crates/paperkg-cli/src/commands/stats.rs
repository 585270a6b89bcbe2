//! Stats command implementation.

use crate::cli::StatsArgs;
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;
use paperkg_extractor::OutputStats;

/// Execute the stats command.
pub fn execute_stats(args: StatsArgs, config: &mut Config, formatter: &Formatter) -> Result<()> {
    config.apply_dirs(&args.dirs);

    let stats = OutputStats::collect(&config.vendor_output_dir(args.vendor))?;
    println!("{}", formatter.format_stats(&stats, args.verbose)?);
    Ok(())
}
