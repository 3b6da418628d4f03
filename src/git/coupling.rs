//! Co-change coupling detection
//!
//! Two files changing in the same commit again and again is a strong hint
//! of implicit coupling. One bulk `git log --name-only` query per
//! repository yields the per-commit file sets; unordered pairs within each
//! set are counted and the frequent ones reported.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::run_git;
use crate::models::CouplingPair;

/// Minimum co-change count for a pair to be reported.
pub const DEFAULT_COUPLING_THRESHOLD: u64 = 3;
/// Default cap on reported pairs.
pub const DEFAULT_MAX_PAIRS: usize = 100;

/// Commits touching more than this many files are treated as bulk or
/// mechanical changes and contribute no pairs. Fixed constant; also bounds
/// the per-commit pair blow-up to 50*49/2 increments.
const BULK_COMMIT_CUTOFF: usize = 50;

/// Marker line separating commits in the bulk query output.
const COMMIT_MARKER: &str = "COMMIT";

/// Detect file pairs that change together at least `threshold` times
/// within the lookback window, most-coupled first.
///
/// A repository whose history cannot be queried yields no pairs.
pub fn detect_coupling(repo: &Path, threshold: u64, max_pairs: usize) -> Vec<CouplingPair> {
    let result = run_git(
        repo,
        &[
            "log",
            "--name-only",
            &format!("--format=format:{}", COMMIT_MARKER),
            "--since=1 year ago",
        ],
        120,
    );

    if !result.success() {
        debug!("Coupling query failed for {:?}, returning no pairs", repo);
        return Vec::new();
    }

    pairs_from_log(&result.stdout, threshold, max_pairs)
}

/// Derive coupling pairs from the bulk log output.
///
/// Pairs are emitted sorted by count descending; ties keep the order in
/// which the pair was first seen in the log. The result is truncated to
/// `max_pairs` after sorting, so truncation never reorders the prefix.
fn pairs_from_log(stdout: &str, threshold: u64, max_pairs: usize) -> Vec<CouplingPair> {
    let mut counts: HashMap<(String, String), u64> = HashMap::new();
    // First-seen order of each unique pair, for stable tie-breaking.
    let mut order: Vec<(String, String)> = Vec::new();

    let mut current: Vec<String> = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line == COMMIT_MARKER {
            tally_commit(&mut counts, &mut order, &current);
            current.clear();
        } else if !line.is_empty() {
            current.push(line.to_string());
        }
    }
    tally_commit(&mut counts, &mut order, &current);

    let mut pairs: Vec<CouplingPair> = order
        .into_iter()
        .filter_map(|key| {
            let count = counts[&key];
            (count >= threshold).then(|| CouplingPair {
                files: [key.0, key.1],
                count,
            })
        })
        .collect();

    // Stable sort preserves first-seen order among equal counts.
    pairs.sort_by(|a, b| b.count.cmp(&a.count));
    pairs.truncate(max_pairs);
    pairs
}

/// Count every unordered pair within one commit's file set.
fn tally_commit(
    counts: &mut HashMap<(String, String), u64>,
    order: &mut Vec<(String, String)>,
    files: &[String],
) {
    if files.len() < 2 || files.len() > BULK_COMMIT_CUTOFF {
        return;
    }

    for i in 0..files.len() {
        for j in (i + 1)..files.len() {
            let (a, b) = if files[i] <= files[j] {
                (&files[i], &files[j])
            } else {
                (&files[j], &files[i])
            };
            let key = (a.clone(), b.clone());
            let entry = counts.entry(key.clone()).or_insert(0);
            if *entry == 0 {
                order.push(key);
            }
            *entry += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(files: &[&str]) -> String {
        let mut s = String::from("COMMIT\n");
        for f in files {
            s.push_str(f);
            s.push('\n');
        }
        s.push('\n');
        s
    }

    fn log(commits: &[&[&str]]) -> String {
        commits.iter().map(|c| commit(c)).collect()
    }

    #[test]
    fn test_pair_at_threshold_is_reported() {
        let log = log(&[&["a.rs", "b.rs"], &["a.rs", "b.rs"], &["a.rs", "b.rs"]]);
        let pairs = pairs_from_log(&log, 3, 100);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].files, ["a.rs".to_string(), "b.rs".to_string()]);
        assert_eq!(pairs[0].count, 3);
    }

    #[test]
    fn test_pair_below_threshold_is_absent() {
        let log = log(&[&["a.rs", "b.rs"], &["a.rs", "b.rs"]]);
        assert!(pairs_from_log(&log, 3, 100).is_empty());
    }

    #[test]
    fn test_pairs_are_unordered() {
        // Same pair seen in both file orders counts once.
        let log = log(&[&["a.rs", "b.rs"], &["b.rs", "a.rs"], &["a.rs", "b.rs"]]);
        let pairs = pairs_from_log(&log, 3, 100);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].count, 3);
    }

    #[test]
    fn test_sorted_by_count_descending() {
        let mut commits: Vec<&[&str]> = Vec::new();
        for _ in 0..5 {
            commits.push(&["hot/a.rs", "hot/b.rs"]);
        }
        for _ in 0..3 {
            commits.push(&["warm/c.rs", "warm/d.rs"]);
        }
        let log = log(&commits);
        let pairs = pairs_from_log(&log, 3, 100);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].count, 5);
        assert_eq!(pairs[1].count, 3);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let log = log(&[
            &["m.rs", "n.rs"],
            &["x.rs", "y.rs"],
            &["m.rs", "n.rs"],
            &["x.rs", "y.rs"],
            &["m.rs", "n.rs"],
            &["x.rs", "y.rs"],
        ]);
        let pairs = pairs_from_log(&log, 3, 100);
        assert_eq!(pairs[0].files, ["m.rs".to_string(), "n.rs".to_string()]);
        assert_eq!(pairs[1].files, ["x.rs".to_string(), "y.rs".to_string()]);
    }

    #[test]
    fn test_truncation_keeps_sorted_prefix() {
        let mut commits: Vec<Vec<&str>> = Vec::new();
        for _ in 0..5 {
            commits.push(vec!["a", "b"]);
        }
        for _ in 0..4 {
            commits.push(vec!["c", "d"]);
        }
        for _ in 0..3 {
            commits.push(vec!["e", "f"]);
        }
        let refs: Vec<&[&str]> = commits.iter().map(|c| c.as_slice()).collect();
        let log = log(&refs);

        let all = pairs_from_log(&log, 3, 100);
        let truncated = pairs_from_log(&log, 3, 2);
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated[..], all[..2]);
    }

    #[test]
    fn test_bulk_commit_contributes_nothing() {
        let files: Vec<String> = (0..60).map(|i| format!("f{}.rs", i)).collect();
        let refs: Vec<&str> = files.iter().map(|s| s.as_str()).collect();
        let log = commit(&refs);
        assert!(pairs_from_log(&log, 1, 1000).is_empty());
    }

    #[test]
    fn test_commit_at_cutoff_still_counts() {
        let files: Vec<String> = (0..50).map(|i| format!("f{:02}.rs", i)).collect();
        let refs: Vec<&str> = files.iter().map(|s| s.as_str()).collect();
        let log = commit(&refs);
        let pairs = pairs_from_log(&log, 1, 2000);
        assert_eq!(pairs.len(), 50 * 49 / 2);
    }

    #[test]
    fn test_single_file_commits_make_no_pairs() {
        let log = log(&[&["a.rs"], &["a.rs"], &["a.rs"]]);
        assert!(pairs_from_log(&log, 1, 100).is_empty());
    }
}
