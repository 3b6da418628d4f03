//! Report tree assembly
//!
//! Turns the flat file→counts mapping for one repository into the nested
//! directory tree of the report schema, attaching commit and contributor
//! annotations where history is available.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::git::FileHistory;
use crate::models::{CommitAnnotation, FileCounts, TreeNode};

/// Intermediate nesting structure; directories are name-sorted by the map.
#[derive(Debug, Default)]
struct DirNode {
    dirs: BTreeMap<String, DirNode>,
    files: Vec<FileEntry>,
}

#[derive(Debug)]
struct FileEntry {
    name: String,
    /// Path relative to the repository root; the history mapping is keyed
    /// by this.
    rel_path: String,
    extension: String,
    counts: FileCounts,
}

/// Assemble the repository subtree for the report.
///
/// `path_prefix` is empty when the analysis root IS the repository,
/// otherwise the repository short name; all emitted paths are prefixed by
/// it. Files whose path does not fall under `repo_path` are silently
/// dropped. Returns `None` when nothing remains.
pub fn build_repo_node(
    files: &BTreeMap<String, FileCounts>,
    repo_path: &Path,
    repo_name: &str,
    path_prefix: &str,
    history: &HashMap<String, FileHistory>,
) -> Option<TreeNode> {
    let root = nest_files(files, repo_path);
    let children = emit_children(&root, path_prefix, history);
    if children.is_empty() {
        return None;
    }

    Some(TreeNode::Repository {
        name: repo_name.to_string(),
        path: if path_prefix.is_empty() {
            repo_name.to_string()
        } else {
            path_prefix.to_string()
        },
        children,
    })
}

/// Build the nested structure from the flat mapping.
fn nest_files(files: &BTreeMap<String, FileCounts>, repo_path: &Path) -> DirNode {
    let mut root = DirNode::default();

    for (file_path, counts) in files {
        let path = Path::new(file_path);
        let rel = match path.strip_prefix(repo_path) {
            Ok(rel) => rel,
            // Relative keys are taken as already repo-relative.
            Err(_) if path.is_relative() => path,
            Err(_) => continue,
        };

        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        let Some((file_name, dirs)) = parts.split_last() else {
            continue;
        };

        let mut current = &mut root;
        for part in dirs {
            current = current.dirs.entry(part.clone()).or_default();
        }

        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        current.files.push(FileEntry {
            name: file_name.clone(),
            rel_path: parts.join("/"),
            extension,
            counts: counts.clone(),
        });
    }

    root
}

/// Emit a directory's children: subdirectories first, then files, each
/// group name-sorted. Empty directory subtrees are pruned entirely.
fn emit_children(
    node: &DirNode,
    path_prefix: &str,
    history: &HashMap<String, FileHistory>,
) -> Vec<TreeNode> {
    let mut children = Vec::new();

    for (dir_name, subtree) in &node.dirs {
        let dir_path = join_path(path_prefix, dir_name);
        let dir_children = emit_children(subtree, &dir_path, history);
        if !dir_children.is_empty() {
            children.push(TreeNode::Directory {
                name: dir_name.clone(),
                path: dir_path,
                children: dir_children,
            });
        }
    }

    let mut files: Vec<&FileEntry> = node.files.iter().collect();
    files.sort_by(|a, b| a.name.cmp(&b.name));
    for file in files {
        children.push(file_node(file, path_prefix, history));
    }

    children
}

/// Build a file leaf. Files absent from the history mapping still get a
/// uniform all-zero `commits` object.
fn file_node(
    file: &FileEntry,
    path_prefix: &str,
    history: &HashMap<String, FileHistory>,
) -> TreeNode {
    let (commits, contributors) = match history.get(&file.rel_path) {
        Some(stats) => (
            CommitAnnotation {
                last_3_months: stats.commits_3m,
                last_year: stats.commits_1y,
                last_commit_date: stats.last_commit_date.clone(),
            },
            Some(stats.contributors()),
        ),
        None => (CommitAnnotation::default(), None),
    };

    TreeNode::File {
        name: file.name.clone(),
        path: join_path(path_prefix, &file.name),
        value: file.counts.code,
        language: file.counts.language.clone(),
        extension: file.extension.clone(),
        commits,
        contributors,
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
