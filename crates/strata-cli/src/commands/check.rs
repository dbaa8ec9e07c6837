//! `strata check`: verify that the files load and merge.

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use super::SourceArgs;

/// Load the files and report the outcome.
pub(crate) fn run(args: &SourceArgs) -> Result<String> {
    args.load()
        .with_context(|| format!("{} {}", "FAIL".red(), args.describe()))?;

    info!(files = args.files.len(), "configuration is valid");
    Ok(format!(
        "{} {} ({} file{})\n",
        "OK".green(),
        args.describe(),
        args.files.len(),
        if args.files.len() == 1 { "" } else { "s" }
    ))
}
