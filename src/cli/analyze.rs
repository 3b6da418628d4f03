//! Analyze command implementation
//!
//! Drives the orchestrator for one named set or for every registered set,
//! handles the interactive staleness prompt, and persists the report plus
//! the rebuilt index.

use anyhow::{bail, Result};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::analysis::Analyzer;
use crate::counter::Cloc;
use crate::error::AtlasError;
use crate::models::StalenessInfo;
use crate::storage::Storage;

pub struct AnalyzeOptions {
    pub yes: bool,
    pub quiet: bool,
    pub threshold: u64,
    pub max_pairs: usize,
    pub workers: usize,
}

impl AnalyzeOptions {
    /// Quiet mode implies non-interactive.
    fn interactive(&self) -> bool {
        !(self.yes || self.quiet)
    }
}

/// Analyze one set. The first run registers it; later runs reuse the
/// stored path, and a conflicting explicit path is an error.
pub fn run_one(
    storage: &Storage,
    name: &str,
    path: Option<&Path>,
    options: &AnalyzeOptions,
) -> Result<()> {
    let set_path = resolve_set_path(storage, name, path)?;

    run_single(storage, name, &set_path, options)?;
    storage.rebuild_index()?;
    Ok(())
}

/// Re-analyze every registered set and rebuild the index once at the end.
pub fn run_all(storage: &Storage, options: &AnalyzeOptions) -> Result<()> {
    let sets = storage.list_sets()?;
    if sets.is_empty() {
        println!("No analysis sets registered.");
        return Ok(());
    }

    if !options.quiet {
        println!("Analyzing {} analysis set(s)...\n", sets.len());
    }

    struct Outcome {
        name: String,
        result: Result<crate::models::ReportStats>,
    }

    let mut outcomes: Vec<Outcome> = Vec::new();
    for (i, set) in sets.iter().enumerate() {
        if !options.quiet {
            println!("{}", "=".repeat(60));
            println!("[{}/{}] {}", i + 1, sets.len(), set.name);
            println!("{}", "=".repeat(60));
        }

        let result = if set.path.exists() {
            run_single(storage, &set.name, &set.path, options)
        } else {
            Err(anyhow::anyhow!("path does not exist: {}", set.path.display()))
        };
        if let Err(e) = &result {
            if !options.quiet {
                println!("Error: {:#}\n", e);
            }
        }
        outcomes.push(Outcome {
            name: set.name.clone(),
            result,
        });
    }

    storage.rebuild_index()?;

    let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let failed = outcomes.len() - succeeded;

    println!("{}", "=".repeat(60));
    println!("Reanalysis complete: {} succeeded, {} failed\n", succeeded, failed);
    println!(
        "  {:<20} {:<10} {:>6} {:>8} {:>12}",
        "NAME", "STATUS", "REPOS", "FILES", "LOC"
    );
    println!("  {}", "-".repeat(58));

    let mut total_repos = 0;
    let mut total_files = 0;
    let mut total_lines = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(stats) => {
                total_repos += stats.total_repos;
                total_files += stats.total_files;
                total_lines += stats.total_lines;
                println!(
                    "  {:<20} {:<10} {:>6} {:>8} {:>12}",
                    outcome.name, "OK", stats.total_repos, stats.total_files, stats.total_lines
                );
            }
            Err(e) => {
                let mut message = format!("{:#}", e);
                if message.len() > 30 {
                    message.truncate(30);
                    message.push_str("...");
                }
                println!("  {:<20} {:<10} {}", outcome.name, "FAILED", message);
            }
        }
    }
    if succeeded > 0 {
        println!("  {}", "-".repeat(58));
        println!(
            "  {:<20} {:<10} {:>6} {:>8} {:>12}",
            "Total", "", total_repos, total_files, total_lines
        );
    }

    if failed == 0 {
        Ok(())
    } else {
        bail!("{} analysis set(s) failed", failed);
    }
}

fn resolve_set_path(
    storage: &Storage,
    name: &str,
    path: Option<&Path>,
) -> Result<std::path::PathBuf> {
    if let Some(set) = storage.get_set(name)? {
        if let Some(given) = path {
            let stored = set.path.canonicalize().unwrap_or_else(|_| set.path.clone());
            let given_resolved = given.canonicalize().unwrap_or_else(|_| given.to_path_buf());
            if stored != given_resolved {
                bail!(
                    "path mismatch for '{}'\n  Stored: {}\n  Given:  {}\nRemove the set first to change its path.",
                    name,
                    set.path.display(),
                    given.display()
                );
            }
        }
        return Ok(set.path);
    }

    let Some(given) = path else {
        return Err(anyhow::Error::new(AtlasError::SetNotFound(name.to_string())).context(
            format!(
                "provide a path to create it: repoatlas analyze {} /path/to/repos",
                name
            ),
        ));
    };
    if !given.exists() {
        bail!("path does not exist: {}", given.display());
    }
    let absolute = given.canonicalize()?;
    storage.add_set(name, &absolute)?;
    println!("Registered '{}' -> {}", name, absolute.display());
    Ok(absolute)
}

fn run_single(
    storage: &Storage,
    name: &str,
    set_path: &Path,
    options: &AnalyzeOptions,
) -> Result<crate::models::ReportStats> {
    if !options.quiet {
        println!("Analyzing '{}' at {}", name, set_path.display());
    }

    let counter = Cloc;
    let analyzer = Analyzer::new(&counter)
        .with_coupling_threshold(options.threshold)
        .with_max_pairs(options.max_pairs)
        .with_workers(options.workers);

    let interactive = options.interactive();
    let quiet = options.quiet;
    let mut confirm = move |_infos: &[StalenessInfo], behind: usize| -> Result<()> {
        if !quiet {
            let noun = if behind > 1 {
                "repositories are"
            } else {
                "repository is"
            };
            println!(">>> {} {} behind remote.", behind, noun);
            println!(">>> Consider running 'git pull' before analyzing.");
        }
        if interactive {
            prompt_to_continue()?;
        }
        Ok(())
    };

    let report = analyzer.analyze(name, set_path, &mut confirm)?;
    let output_path = storage.write_report(&report)?;

    if !options.quiet {
        println!("\nAnalysis complete!");
        println!("  Repositories: {}", report.stats.total_repos);
        println!("  Files: {}", report.stats.total_files);
        println!("  Lines of code: {}", report.stats.total_lines);
        println!("\nOutput: {}", output_path.display());
    }

    Ok(report.stats)
}

/// Block on stdin; an EOF or empty line both continue, so piped runs do
/// not hang forever.
fn prompt_to_continue() -> Result<()> {
    print!("\n>>> Press Enter to continue, or Ctrl-C to abort... ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
