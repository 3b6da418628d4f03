//! Repository staleness detection
//!
//! Classifies each repository against its tracked remote without mutating
//! working-tree state: a dry-run fetch plus read-only branch queries.
//! Checks across repositories are independent, so they run on a bounded
//! worker pool and are re-sorted by repository name afterwards.

use std::path::{Path, PathBuf};
use std::thread;

use chrono::Utc;
use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use super::{parse_author_date, run_git};
use crate::discovery::repo_name;
use crate::models::{RemoteStatus, StalenessInfo};

/// Worker pool width for cross-repository checks.
pub const DEFAULT_WORKERS: usize = 10;

/// A fetch blocked on an unreachable remote must not hang the run.
const FETCH_TIMEOUT_SECS: u64 = 30;
/// Timeout for the cheap read-only queries.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Conventional default-branch names, checked in order when the remote's
/// symbolic HEAD is not set locally.
const DEFAULT_BRANCH_CANDIDATES: [&str; 4] = ["main", "master", "trunk", "dev"];

/// Check staleness for all repositories on a bounded worker pool.
///
/// Each worker owns its repository path exclusively; results are collected
/// over a channel and sorted by repository name regardless of completion
/// order.
pub fn check_staleness(repos: &[PathBuf], workers: usize) -> Vec<StalenessInfo> {
    if repos.is_empty() {
        return Vec::new();
    }

    let (task_tx, task_rx) = unbounded::<PathBuf>();
    let (result_tx, result_rx) = unbounded::<StalenessInfo>();

    for repo in repos {
        task_tx.send(repo.clone()).expect("queue staleness task");
    }
    drop(task_tx);

    let pool_size = workers.max(1).min(repos.len());
    let mut handles = Vec::with_capacity(pool_size);
    for _ in 0..pool_size {
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        handles.push(thread::spawn(move || {
            while let Ok(repo) = task_rx.recv() {
                let info = check_repo(&repo);
                if result_tx.send(info).is_err() {
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    let mut infos: Vec<StalenessInfo> = result_rx.iter().collect();
    for handle in handles {
        let _ = handle.join();
    }

    infos.sort_by(|a, b| a.repo.cmp(&b.repo));
    infos
}

/// Check one repository's staleness and remote status.
///
/// State machine: `unknown -> {no_remote | fetch_failed | behind |
/// up_to_date}`. Every failure degrades a field to null instead of
/// erroring; a repository with zero commits yields null date and age.
pub fn check_repo(repo_path: &Path) -> StalenessInfo {
    let mut info = StalenessInfo::new(repo_name(repo_path));

    // Current branch; a detached HEAD reports the literal "HEAD".
    let result = run_git(repo_path, &["rev-parse", "--abbrev-ref", "HEAD"], QUERY_TIMEOUT_SECS);
    if result.success() {
        let branch = result.stdout.trim();
        if !branch.is_empty() && branch != "HEAD" {
            info.branch = Some(branch.to_string());
        }
    }

    // Last local commit date and age in whole days.
    let result = run_git(repo_path, &["log", "-1", "--format=%aI"], QUERY_TIMEOUT_SECS);
    if result.success() && !result.stdout.trim().is_empty() {
        let date = result.stdout.trim().to_string();
        if let Some(ts) = parse_author_date(&date) {
            info.last_commit_age_days = Some(age_in_days(ts));
        }
        info.last_commit_date = Some(date);
    }

    // No remotes configured is a terminal state.
    let result = run_git(repo_path, &["remote"], QUERY_TIMEOUT_SECS);
    if !result.success() || result.stdout.trim().is_empty() {
        info.remote_status = RemoteStatus::NoRemote;
        return info;
    }

    info.default_branch = detect_default_branch(repo_path);

    // Non-destructive probe for incoming updates.
    let result = run_git(repo_path, &["fetch", "--dry-run"], FETCH_TIMEOUT_SECS);
    if !result.success() {
        info.remote_status = RemoteStatus::FetchFailed;
        let first_error = result
            .stderr
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .or(result.error);
        info.error = first_error;
        return info;
    }

    if fetch_reports_updates(&result.stderr) {
        info.remote_status = RemoteStatus::Behind;
        info.commits_behind = count_commits_behind(repo_path, &info);
    } else {
        info.remote_status = RemoteStatus::UpToDate;
    }

    info
}

/// Whole days since `ts`, truncated.
fn age_in_days(ts: i64) -> i64 {
    (Utc::now().timestamp_micros() - ts * 1_000_000) / (86_400 * 1_000_000)
}

/// A dry-run fetch that found updates prints a `From <url>` header on
/// stderr; a quiet fetch prints nothing.
fn fetch_reports_updates(stderr: &str) -> bool {
    let trimmed = stderr.trim();
    !trimmed.is_empty() && trimmed.contains("From")
}

/// Detect the remote's default branch: symbolic HEAD first, then the
/// conventional candidates in order.
fn detect_default_branch(repo_path: &Path) -> Option<String> {
    let result = run_git(
        repo_path,
        &["symbolic-ref", "refs/remotes/origin/HEAD"],
        QUERY_TIMEOUT_SECS,
    );
    if result.success() {
        let ref_name = result.stdout.trim();
        if let Some(branch) = ref_name.strip_prefix("refs/remotes/origin/") {
            return Some(branch.to_string());
        }
    }

    for candidate in DEFAULT_BRANCH_CANDIDATES {
        let verify = run_git(
            repo_path,
            &[
                "rev-parse",
                "--verify",
                &format!("refs/remotes/origin/{}", candidate),
            ],
            QUERY_TIMEOUT_SECS,
        );
        if verify.success() {
            return Some(candidate.to_string());
        }
    }

    None
}

/// Best-effort exact behind count: the current branch's upstream first,
/// the detected default branch second. A failed count leaves `None`
/// without demoting the `behind` status.
fn count_commits_behind(repo_path: &Path, info: &StalenessInfo) -> Option<u64> {
    let branch = info.branch.as_deref()?;

    let range = format!("{}..origin/{}", branch, branch);
    let result = run_git(repo_path, &["rev-list", "--count", &range], QUERY_TIMEOUT_SECS);
    if result.success() {
        if let Ok(count) = result.stdout.trim().parse::<u64>() {
            return Some(count);
        }
    }

    let default_branch = info.default_branch.as_deref()?;
    if default_branch == branch {
        return None;
    }
    let range = format!("{}..origin/{}", branch, default_branch);
    let result = run_git(repo_path, &["rev-list", "--count", &range], QUERY_TIMEOUT_SECS);
    if result.success() {
        if let Ok(count) = result.stdout.trim().parse::<u64>() {
            return Some(count);
        }
    }

    debug!("Could not count commits behind for {:?}", repo_path);
    None
}

/// Format staleness info into an aligned status table, or an empty string
/// when there is nothing to report.
pub fn format_staleness_warning(infos: &[StalenessInfo]) -> String {
    if infos.is_empty() {
        return String::new();
    }

    let mut rows: Vec<[String; 5]> = Vec::with_capacity(infos.len());
    let mut errors: Vec<String> = Vec::new();

    for info in infos {
        let status = match info.remote_status {
            RemoteStatus::Behind => "[  BEHIND  ]",
            RemoteStatus::FetchFailed => {
                if let Some(error) = &info.error {
                    errors.push(format!("  {}: {}", info.repo, error));
                }
                "[FETCH FAIL]"
            }
            RemoteStatus::NoRemote => "[ NO REMOTE]",
            _ => "[UP TO DATE]",
        };

        let age = match info.last_commit_age_days {
            Some(0) => "today".to_string(),
            Some(1) => "1 day".to_string(),
            Some(days) => format!("{} days", days),
            None => "?".to_string(),
        };
        let date = info
            .last_commit_date
            .as_deref()
            .map(|d| d.chars().take(10).collect::<String>())
            .unwrap_or_else(|| "unknown".to_string());
        let branch = info.branch.clone().unwrap_or_else(|| "(detached)".to_string());

        rows.push([status.to_string(), info.repo.clone(), branch, date, age]);
    }

    let mut widths = [0usize; 5];
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    let header = format!(
        "  {:<sw$}  {:<rw$}  {:<bw$}  {:<dw$}",
        "STATUS",
        "REPOSITORY",
        "BRANCH",
        "LAST LOCAL COMMIT",
        sw = widths[0],
        rw = widths[1],
        bw = widths[2],
        dw = widths[3] + widths[4] + 4,
    );
    let mut lines = vec![header.clone(), format!("  {}", "-".repeat(header.len() - 2))];

    for row in &rows {
        lines.push(format!(
            "  {}  {:<rw$}  {:<bw$}  {}  ({:>aw$})",
            row[0],
            row[1],
            row[2],
            row[3],
            row[4],
            rw = widths[1],
            bw = widths[2],
            aw = widths[4],
        ));
    }

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("  Fetch errors:".to_string());
        lines.extend(errors);
    }

    lines.join("\n")
}

/// Count repositories reported behind their remote. A `behind` result is a
/// user-facing warning, never an error.
pub fn behind_count(infos: &[StalenessInfo]) -> usize {
    let behind = infos
        .iter()
        .filter(|i| i.remote_status == RemoteStatus::Behind)
        .count();
    if behind > 0 {
        warn!("{} repositories are behind their remote", behind);
    }
    behind
}
