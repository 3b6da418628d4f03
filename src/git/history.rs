//! Per-file commit statistics
//!
//! Extracts commit counts, recency buckets, and contributor sets for every
//! file touched within the trailing one-year lookback window, via one bulk
//! `git log --name-status` query per repository.
//!
//! Renames are the tricky part: the bulk pass attributes a rename record
//! to the file's new path, but commits predating the rename stay under the
//! old name. Every rename-touched path therefore gets a dedicated
//! `--follow` re-query whose result replaces the bulk numbers (contributor
//! sets are unioned, since both passes see real authors).

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

use super::{parse_author_date, run_git};
use crate::models::Contributors;

/// Lookback window handed to `git log --since`.
const LOOKBACK: &str = "1 year ago";
/// Recency sub-window in days.
const RECENT_WINDOW_DAYS: i64 = 90;
/// Timeout for log queries; a local log should never take this long.
const LOG_TIMEOUT_SECS: u64 = 120;

/// Commit statistics for one file within the lookback window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileHistory {
    /// Commits in the trailing 3 months
    pub commits_3m: u64,
    /// Commits in the trailing year
    pub commits_1y: u64,
    /// Most recent commit timestamp (ISO-8601, as git reported it)
    pub last_commit_date: Option<String>,
    /// Unique author display names
    pub authors: BTreeSet<String>,
}

impl FileHistory {
    /// Contributor summary: count plus sorted unique names.
    pub fn contributors(&self) -> Contributors {
        Contributors {
            count: self.authors.len(),
            names: self.authors.iter().cloned().collect(),
        }
    }
}

/// Get commit statistics for all files in a repository.
///
/// Returns a mapping from repository-relative file path to its stats. A
/// repository whose history cannot be queried (not version-controlled,
/// corrupted) yields an empty mapping rather than an error.
pub fn file_stats(repo: &Path) -> HashMap<String, FileHistory> {
    let result = run_git(
        repo,
        &[
            "log",
            "-M",
            "--name-status",
            "--format=COMMIT|%aI|%an",
            &format!("--since={}", LOOKBACK),
        ],
        LOG_TIMEOUT_SECS,
    );

    if !result.success() {
        debug!("History query failed for {:?}, returning no commit data", repo);
        return HashMap::new();
    }

    let cutoff = recent_cutoff();
    let (mut stats, renamed) = parse_bulk_log(&result.stdout, cutoff);

    // The bulk pass undercounts pre-rename history; re-resolve each
    // rename target individually.
    for path in renamed {
        if let Some(mut followed) = follow_stats(repo, &path, cutoff) {
            if let Some(bulk) = stats.get(&path) {
                followed.authors.extend(bulk.authors.iter().cloned());
            }
            stats.insert(path, followed);
        }
    }

    stats
}

/// Unix timestamp of the 3-month recency boundary.
fn recent_cutoff() -> i64 {
    chrono::Utc::now().timestamp() - RECENT_WINDOW_DAYS * 24 * 60 * 60
}

/// Stream-parse the bulk `--name-status` log.
///
/// Returns per-file stats plus the set of paths touched by a rename
/// record. History is emitted newest-first, so the first date seen for a
/// path is its most recent commit.
fn parse_bulk_log(stdout: &str, cutoff: i64) -> (HashMap<String, FileHistory>, BTreeSet<String>) {
    let mut stats: HashMap<String, FileHistory> = HashMap::new();
    let mut renamed: BTreeSet<String> = BTreeSet::new();

    let mut current_date: Option<String> = None;
    // 0 marks a malformed timestamp: counts toward the year but never the
    // recency bucket.
    let mut current_ts: i64 = 0;
    let mut current_author: Option<String> = None;

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix("COMMIT|") {
            let (date, author) = match header.split_once('|') {
                Some((date, author)) => (date, author),
                None => (header, ""),
            };
            current_ts = parse_author_date(date).unwrap_or(0);
            current_date = Some(date.to_string());
            current_author = (!author.is_empty()).then(|| author.to_string());
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            continue;
        }

        let status = parts[0];
        let file_path = if status.starts_with('R') {
            // R<score>\told\tnew: attribute to the new path and flag it
            // for precise re-resolution.
            if parts.len() == 3 {
                renamed.insert(parts[2].to_string());
                parts[2]
            } else {
                continue;
            }
        } else if matches!(status, "M" | "A" | "D") {
            parts[1]
        } else {
            continue;
        };

        let entry = stats.entry(file_path.to_string()).or_default();
        entry.commits_1y += 1;
        if current_ts > 0 && current_ts >= cutoff {
            entry.commits_3m += 1;
        }
        if entry.last_commit_date.is_none() {
            entry.last_commit_date = current_date.clone();
        }
        if let Some(author) = &current_author {
            entry.authors.insert(author.clone());
        }
    }

    (stats, renamed)
}

/// Accurate stats for a single file using rename-following.
///
/// Returns `None` when the query fails or reports nothing, in which case
/// the bulk-pass numbers stand.
fn follow_stats(repo: &Path, file_path: &str, cutoff: i64) -> Option<FileHistory> {
    let result = run_git(
        repo,
        &[
            "log",
            "--follow",
            "--format=%aI|%an",
            &format!("--since={}", LOOKBACK),
            "--",
            file_path,
        ],
        LOG_TIMEOUT_SECS,
    );

    if !result.success() || result.stdout.trim().is_empty() {
        return None;
    }

    let mut history = FileHistory::default();
    for line in result.stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (date, author) = line.split_once('|').unwrap_or((line, ""));

        history.commits_1y += 1;
        if history.last_commit_date.is_none() {
            history.last_commit_date = Some(date.to_string());
        }
        if let Some(ts) = parse_author_date(date) {
            if ts >= cutoff {
                history.commits_3m += 1;
            }
        }
        if !author.is_empty() {
            history.authors.insert(author.to_string());
        }
    }

    Some(history)
}
