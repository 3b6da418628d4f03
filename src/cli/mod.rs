//! CLI command definitions and handlers

mod analyze;
mod sets;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::git::{DEFAULT_COUPLING_THRESHOLD, DEFAULT_MAX_PAIRS, DEFAULT_WORKERS};
use crate::storage::Storage;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// repoatlas - Git repository inventory and churn analytics
#[derive(Parser, Debug)]
#[command(name = "repoatlas")]
#[command(
    version,
    about = "Inventory a folder of Git repositories: code volume, churn, staleness, and co-change coupling",
    after_help = "\
Examples:
  repoatlas analyze work ~/src          Register and analyze ~/src as 'work'
  repoatlas analyze work                Re-analyze using the stored path
  repoatlas analyze --all --yes         Re-analyze every registered set
  repoatlas list                        Show registered analysis sets
  repoatlas index                       Rebuild the report index"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Storage root for the registry, reports, and index (default: ~/.repoatlas)
    #[arg(long, global = true)]
    pub storage_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new analysis set
    Add {
        /// Name for the analysis set
        name: String,
        /// Path to the folder containing repositories
        path: PathBuf,
    },

    /// List registered analysis sets
    List,

    /// Remove an analysis set and its report
    Remove {
        /// Name of the analysis set
        name: String,
    },

    /// Analyze an analysis set and persist its report
    #[command(after_help = "\
Examples:
  repoatlas analyze work ~/src                    First run registers the set
  repoatlas analyze work                          Later runs reuse the stored path
  repoatlas analyze work --threshold 5            Stricter coupling threshold
  repoatlas analyze --all --quiet                 Batch mode, summary only")]
    Analyze {
        /// Name of the analysis set (omit with --all)
        name: Option<String>,

        /// Path to the folder containing repositories (required on first run)
        path: Option<PathBuf>,

        /// Analyze every registered set
        #[arg(long)]
        all: bool,

        /// Skip the interactive prompt when repositories are behind remote
        #[arg(long, short = 'y')]
        yes: bool,

        /// Summary output only (implies --yes)
        #[arg(long, short = 'q')]
        quiet: bool,

        /// Minimum co-change count for coupling pairs
        #[arg(long, default_value_t = DEFAULT_COUPLING_THRESHOLD)]
        threshold: u64,

        /// Maximum coupling pairs in the report
        #[arg(long, default_value_t = DEFAULT_MAX_PAIRS)]
        max_pairs: usize,

        /// Parallel workers for staleness checks (1-64)
        #[arg(long, default_value_t = DEFAULT_WORKERS, value_parser = parse_workers)]
        workers: usize,
    },

    /// Rebuild the report index from persisted reports
    Index,
}

/// Dispatch a parsed CLI invocation.
pub fn run(cli: Cli) -> Result<()> {
    let storage = Storage::new(
        cli.storage_root
            .clone()
            .unwrap_or_else(Storage::default_root),
    );

    match cli.command {
        Commands::Add { name, path } => sets::add(&storage, &name, &path),
        Commands::List => sets::list(&storage),
        Commands::Remove { name } => sets::remove(&storage, &name),
        Commands::Analyze {
            name,
            path,
            all,
            yes,
            quiet,
            threshold,
            max_pairs,
            workers,
        } => {
            let options = analyze::AnalyzeOptions {
                yes,
                quiet,
                threshold,
                max_pairs,
                workers,
            };
            if all {
                analyze::run_all(&storage, &options)
            } else {
                let name = name.ok_or_else(|| {
                    anyhow::anyhow!("provide an analysis set name, or use --all")
                })?;
                analyze::run_one(&storage, &name, path.as_deref(), &options)
            }
        }
        Commands::Index => {
            storage.rebuild_index()?;
            println!("Index rebuilt.");
            Ok(())
        }
    }
}
