//! Core data models for repoatlas
//!
//! These models mirror the persisted report schema: per-file counts and
//! commit annotations, the tagged tree, coupling pairs, staleness results,
//! and the top-level analysis report plus its index.

use serde::{Deserialize, Serialize};

/// Raw per-file counts as reported by the line counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileCounts {
    #[serde(default)]
    pub blank: u64,
    #[serde(default)]
    pub comment: u64,
    #[serde(default)]
    pub code: u64,
    #[serde(default = "unknown_language")]
    pub language: String,
}

fn unknown_language() -> String {
    "Unknown".to_string()
}

/// Commit recency annotation attached to every file leaf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitAnnotation {
    pub last_3_months: u64,
    pub last_year: u64,
    pub last_commit_date: Option<String>,
}

/// Contributor summary for a file: sorted unique author names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contributors {
    pub count: usize,
    pub names: Vec<String>,
}

/// A node in the assembled report tree.
///
/// Modeled as a tagged enum so the assembler handles every node kind
/// exhaustively; serializes to the `{.., "type": "file"|...}` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    AnalysisSet {
        name: String,
        children: Vec<TreeNode>,
    },
    Repository {
        name: String,
        path: String,
        children: Vec<TreeNode>,
    },
    Directory {
        name: String,
        path: String,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        path: String,
        value: u64,
        language: String,
        extension: String,
        commits: CommitAnnotation,
        #[serde(skip_serializing_if = "Option::is_none")]
        contributors: Option<Contributors>,
    },
}

impl TreeNode {
    /// Node name regardless of kind.
    pub fn name(&self) -> &str {
        match self {
            TreeNode::AnalysisSet { name, .. }
            | TreeNode::Repository { name, .. }
            | TreeNode::Directory { name, .. }
            | TreeNode::File { name, .. } => name,
        }
    }

    /// Children of a non-leaf node; empty slice for files.
    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::AnalysisSet { children, .. }
            | TreeNode::Repository { children, .. }
            | TreeNode::Directory { children, .. } => children,
            TreeNode::File { .. } => &[],
        }
    }
}

/// An unordered pair of files that changed together, with its co-change count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplingPair {
    pub files: [String; 2],
    pub count: u64,
}

/// Coupling section of the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CouplingReport {
    pub threshold: u64,
    pub pairs: Vec<CouplingPair>,
}

/// Remote status of a repository relative to its tracked remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    Unknown,
    NoRemote,
    FetchFailed,
    Behind,
    UpToDate,
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteStatus::Unknown => write!(f, "unknown"),
            RemoteStatus::NoRemote => write!(f, "no_remote"),
            RemoteStatus::FetchFailed => write!(f, "fetch_failed"),
            RemoteStatus::Behind => write!(f, "behind"),
            RemoteStatus::UpToDate => write!(f, "up_to_date"),
        }
    }
}

/// Staleness and remote-divergence info for one repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalenessInfo {
    pub repo: String,
    pub branch: Option<String>,
    pub last_commit_date: Option<String>,
    pub last_commit_age_days: Option<i64>,
    pub remote_status: RemoteStatus,
    pub commits_behind: Option<u64>,
    pub default_branch: Option<String>,
    pub error: Option<String>,
}

impl StalenessInfo {
    /// Fresh record for a repository, everything unknown.
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            branch: None,
            last_commit_date: None,
            last_commit_age_days: None,
            remote_status: RemoteStatus::Unknown,
            commits_behind: None,
            default_branch: None,
            error: None,
        }
    }
}

/// Summary statistics for a whole analysis set.
///
/// `languages` maps language name to aggregate code lines, kept in
/// descending line-count order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportStats {
    pub total_files: u64,
    pub total_lines: u64,
    pub total_repos: u64,
    #[serde(default)]
    pub languages: serde_json::Map<String, serde_json::Value>,
}

/// Top-level persisted report for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis_set: String,
    pub root_path: String,
    pub generated_at: String,
    pub stats: ReportStats,
    pub coupling: CouplingReport,
    pub tree: TreeNode,
}

/// One entry in the regenerable report index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub name: String,
    pub filename: String,
    pub generated_at: Option<String>,
    #[serde(default)]
    pub stats: ReportStats,
}

/// Index of all persisted reports, rebuilt by scanning the storage root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisIndex {
    pub analyses: Vec<IndexEntry>,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_node_tagged_serialization() {
        let node = TreeNode::File {
            name: "main.rs".to_string(),
            path: "src/main.rs".to_string(),
            value: 42,
            language: "Rust".to_string(),
            extension: ".rs".to_string(),
            commits: CommitAnnotation::default(),
            contributors: None,
        };
        let json = serde_json::to_value(&node).expect("serialize node");
        assert_eq!(json["type"], "file");
        assert_eq!(json["value"], 42);
        assert!(json.get("contributors").is_none());
        assert_eq!(json["commits"]["last_year"], 0);
        assert!(json["commits"]["last_commit_date"].is_null());
    }

    #[test]
    fn test_remote_status_serde_names() {
        let json = serde_json::to_string(&RemoteStatus::UpToDate).expect("serialize");
        assert_eq!(json, "\"up_to_date\"");
        let back: RemoteStatus = serde_json::from_str("\"fetch_failed\"").expect("parse");
        assert_eq!(back, RemoteStatus::FetchFailed);
    }

    #[test]
    fn test_file_counts_defaults() {
        let counts: FileCounts = serde_json::from_str("{\"code\": 10}").expect("parse");
        assert_eq!(counts.code, 10);
        assert_eq!(counts.blank, 0);
        assert_eq!(counts.language, "Unknown");
    }
}
