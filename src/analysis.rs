//! Analysis orchestration
//!
//! Sequences discovery, staleness checks, line counting, history
//! extraction, coupling detection, and tree assembly into one
//! `AnalysisReport`. Per-repository analysis is independent; the only
//! cross-repository state is the running totals held here.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::counter::LineCounter;
use crate::discovery::{discover_repos, repo_name};
use crate::error::AtlasError;
use crate::git::{
    self, check_staleness, detect_coupling, file_stats, format_staleness_warning,
    staleness::behind_count, DEFAULT_COUPLING_THRESHOLD, DEFAULT_MAX_PAIRS, DEFAULT_WORKERS,
};
use crate::models::{
    AnalysisReport, CouplingPair, CouplingReport, FileCounts, ReportStats, StalenessInfo, TreeNode,
};
use crate::tree::build_repo_node;

/// Hook invoked when repositories are behind their remote; returning an
/// error aborts the run before any repository is analyzed.
pub type StalenessConfirm<'a> = dyn FnMut(&[StalenessInfo], usize) -> Result<()> + 'a;

/// Orchestrates one analysis run over a root of repositories.
pub struct Analyzer<'a> {
    counter: &'a dyn LineCounter,
    coupling_threshold: u64,
    max_pairs: usize,
    workers: usize,
}

impl<'a> Analyzer<'a> {
    pub fn new(counter: &'a dyn LineCounter) -> Self {
        Self {
            counter,
            coupling_threshold: DEFAULT_COUPLING_THRESHOLD,
            max_pairs: DEFAULT_MAX_PAIRS,
            workers: DEFAULT_WORKERS,
        }
    }

    /// Set the minimum co-change count for coupling pairs.
    pub fn with_coupling_threshold(mut self, threshold: u64) -> Self {
        self.coupling_threshold = threshold;
        self
    }

    /// Set the cap on reported coupling pairs.
    pub fn with_max_pairs(mut self, max_pairs: usize) -> Self {
        self.max_pairs = max_pairs;
        self
    }

    /// Set the staleness worker pool width.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Analyze all repositories under `root` and produce one report.
    ///
    /// # Errors
    ///
    /// Fatal conditions: missing root, no repositories found, required
    /// external tools absent, every repository unusable, or an abort from
    /// the staleness confirmation hook. A single repository failing is
    /// logged and skipped.
    pub fn analyze(
        &self,
        analysis_set: &str,
        root: &Path,
        confirm: &mut StalenessConfirm,
    ) -> Result<AnalysisReport> {
        if !root.exists() {
            return Err(AtlasError::PathNotFound(root.to_path_buf()).into());
        }

        git::ensure_git_available()?;
        self.counter.ensure_available()?;

        let repos = discover_repos(root)?;
        if repos.is_empty() {
            return Err(AtlasError::NoRepositoriesFound(root.to_path_buf()).into());
        }
        info!("Found {} repositories", repos.len());

        info!("Checking repository status...");
        let staleness = check_staleness(&repos, self.workers);
        let table = format_staleness_warning(&staleness);
        if !table.is_empty() {
            info!("Repository status:\n{}", table);
        }
        let behind = behind_count(&staleness);
        if behind > 0 {
            confirm(&staleness, behind)?;
        }

        let mut totals = Totals::default();
        let mut repo_nodes: Vec<TreeNode> = Vec::new();
        let mut all_pairs: Vec<CouplingPair> = Vec::new();

        for (i, repo_path) in repos.iter().enumerate() {
            let name = repo_name(repo_path);
            info!("[{}/{}] Analyzing {}...", i + 1, repos.len(), name);

            match self.analyze_repo(repo_path, root, &name) {
                Ok(Some(analyzed)) => {
                    totals.fold(&analyzed.files);
                    info!(
                        "  {} files, {} lines",
                        analyzed.files.len(),
                        analyzed.files.values().map(|f| f.code).sum::<u64>()
                    );
                    repo_nodes.push(analyzed.node);
                    all_pairs.extend(analyzed.pairs);
                }
                Ok(None) => info!("  No files found in {}, skipping", name),
                Err(e) => warn!("  Skipping {}: {:#}", name, e),
            }
        }

        if repo_nodes.is_empty() {
            return Err(AtlasError::NoRepositoriesAnalyzed.into());
        }

        // Per-repository pairs were appended in discovery order; a stable
        // re-sort keeps that order among equal counts.
        all_pairs.sort_by(|a, b| b.count.cmp(&a.count));
        all_pairs.truncate(self.max_pairs);

        let total_repos = repo_nodes.len() as u64;
        Ok(AnalysisReport {
            analysis_set: analysis_set.to_string(),
            root_path: root.to_string_lossy().to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            stats: totals.into_stats(total_repos),
            coupling: CouplingReport {
                threshold: self.coupling_threshold,
                pairs: all_pairs,
            },
            tree: TreeNode::AnalysisSet {
                name: analysis_set.to_string(),
                children: repo_nodes,
            },
        })
    }

    /// Analyze one repository: count lines, extract history and coupling,
    /// assemble the subtree. `Ok(None)` means no usable files.
    fn analyze_repo(
        &self,
        repo_path: &Path,
        root: &Path,
        name: &str,
    ) -> Result<Option<AnalyzedRepo>> {
        let files = self.counter.count(repo_path)?;
        if files.is_empty() {
            return Ok(None);
        }

        let history = file_stats(repo_path);
        let mut pairs = detect_coupling(repo_path, self.coupling_threshold, self.max_pairs);

        let prefix = if is_same_path(repo_path, root) { "" } else { name };
        if !prefix.is_empty() {
            for pair in &mut pairs {
                for file in &mut pair.files {
                    *file = format!("{}/{}", prefix, file);
                }
            }
        }

        let node = build_repo_node(&files, repo_path, name, prefix, &history);
        Ok(node.map(|node| AnalyzedRepo { node, files, pairs }))
    }
}

struct AnalyzedRepo {
    node: TreeNode,
    files: BTreeMap<String, FileCounts>,
    pairs: Vec<CouplingPair>,
}

/// Running totals across repositories; only the orchestrator touches them.
#[derive(Default)]
struct Totals {
    files: u64,
    lines: u64,
    languages: BTreeMap<String, u64>,
}

impl Totals {
    fn fold(&mut self, files: &BTreeMap<String, FileCounts>) {
        for counts in files.values() {
            self.files += 1;
            self.lines += counts.code;
            *self.languages.entry(counts.language.clone()).or_insert(0) += counts.code;
        }
    }

    fn into_stats(self, total_repos: u64) -> ReportStats {
        let mut by_lines: Vec<(String, u64)> = self.languages.into_iter().collect();
        by_lines.sort_by(|a, b| b.1.cmp(&a.1));

        let mut languages = serde_json::Map::new();
        for (language, lines) in by_lines {
            languages.insert(language, serde_json::Value::from(lines));
        }

        ReportStats {
            total_files: self.files,
            total_lines: self.lines,
            total_repos,
            languages,
        }
    }
}

/// The "root IS the repository" check; resolution tolerates paths that
/// cannot be canonicalized.
fn is_same_path(a: &Path, b: &Path) -> bool {
    let resolve = |p: &Path| p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
    resolve(a) == resolve(b)
}

/// Convenience hook for non-interactive runs: warn and continue.
pub fn continue_despite_staleness(infos: &[StalenessInfo], behind: usize) -> Result<()> {
    let _ = infos;
    warn!("{} repositories behind remote; continuing", behind);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_totals_sorted_descending() {
        let mut totals = Totals::default();
        let files: BTreeMap<String, FileCounts> = [
            ("a.py", 10, "Python"),
            ("b.rs", 100, "Rust"),
            ("c.rs", 50, "Rust"),
            ("d.go", 60, "Go"),
        ]
        .into_iter()
        .map(|(path, code, language)| {
            (
                path.to_string(),
                FileCounts {
                    code,
                    language: language.to_string(),
                    ..Default::default()
                },
            )
        })
        .collect();
        totals.fold(&files);

        let stats = totals.into_stats(1);
        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.total_lines, 220);
        let order: Vec<&String> = stats.languages.keys().collect();
        assert_eq!(order, vec!["Rust", "Go", "Python"]);
        assert_eq!(stats.languages["Rust"], 150);
    }

    #[test]
    fn test_is_same_path_resolves() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(is_same_path(dir.path(), dir.path()));
        let child = dir.path().join("x");
        std::fs::create_dir(&child).expect("mkdir");
        assert!(!is_same_path(dir.path(), &child));
        assert!(is_same_path(&dir.path().join("x/.."), dir.path()));
    }
}
