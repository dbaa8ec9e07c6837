//! Strata CLI - merge, inspect and check layered YAML configuration.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use strata_telemetry::{LogConfig, LogFormat, setup_logging};

mod commands;

use commands::{SourceArgs, check, merge, show};

/// Strata - layered YAML configuration
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log format: compact (default), pretty or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overlay the files in order and print the result
    Merge {
        /// Files to load, later files overlaying earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the merged tree with anchors and aliases instead of YAML
        #[arg(long)]
        tree: bool,

        /// Expand `${VAR}` references from the environment
        #[arg(long)]
        expand_env: bool,
    },

    /// Print the merged configuration with secrets hidden
    Show {
        /// Files to load, later files overlaying earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Mask every value of a secret subtree instead of collapsing it
        #[arg(long)]
        preserve: bool,

        /// Regular expression matching secret keys (case-insensitive)
        #[arg(long, env = "STRATA_SECRET_PATTERN")]
        secret_pattern: Option<String>,

        /// Expand `${VAR}` references from the environment
        #[arg(long)]
        expand_env: bool,
    },

    /// Load the files and report whether they merge cleanly
    Check {
        /// Files to load, later files overlaying earlier ones
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Expand `${VAR}` references from the environment
        #[arg(long)]
        expand_env: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_env_directives();
    if !std::io::stderr().is_terminal() {
        log_config = log_config.without_ansi();
    }
    if let Err(e) = setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let output = match cli.command {
        Commands::Merge {
            files,
            tree,
            expand_env,
        } => merge::run(&SourceArgs { files, expand_env }, tree)?,
        Commands::Show {
            files,
            preserve,
            secret_pattern,
            expand_env,
        } => show::run(
            &SourceArgs { files, expand_env },
            preserve,
            secret_pattern.as_deref(),
        )?,
        Commands::Check { files, expand_env } => check::run(&SourceArgs { files, expand_env })?,
    };

    print!("{output}");
    Ok(())
}
